//! Fixed-point constants and the attenuation table

/// One output sample in 16.16 fixed point
pub const STEP: i32 = 0x10000;

/// Largest value the chip mixer produces
pub const MAX_OUTPUT: i32 = 0x7fff;

/// Per-step attenuation: 2 dB
const ATTENUATION_STEP: f64 = 1.258_925_412;

/// Per-step gain: about 0.2 dB
const GAIN_STEP: f64 = 1.023_292_992;

/// Build the 16-entry volume table for a gain boost of `gain` steps
///
/// Entry 0 is the loudest level, each following entry is 2 dB quieter and
/// entry 15 is silence. With four channels at full volume the sum stays at
/// the `MAX_OUTPUT` ceiling.
pub fn volume_table(gain: u8) -> [i32; 16] {
    let ceiling = MAX_OUTPUT as f64 / 4.0;
    let mut level = ceiling;
    for _ in 0..gain {
        level *= GAIN_STEP;
    }

    let mut table = [0i32; 16];
    for entry in table.iter_mut().take(15) {
        *entry = if level > ceiling {
            MAX_OUTPUT / 4
        } else {
            (level + 0.5) as i32
        };
        level /= ATTENUATION_STEP;
    }
    table[15] = 0;
    table
}

/// Samples-per-clock ratio in 16.16 fixed point, scaled by 16 for the
/// chip's internal divider
pub fn update_step(clock: u32, sample_rate: u32) -> i32 {
    ((STEP as f64 * sample_rate as f64 * 16.0) / clock as f64) as i32
}

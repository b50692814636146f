//! SN76489 PSG emulation
//!
//! Three square wave tone channels and one noise channel, mixed through a
//! logarithmic volume table. Runs at the output sample rate: each call to
//! [`Sn76489::update`] integrates the chip's waveforms over whole samples in
//! 16.16 fixed point, so no high-rate clocking is needed.

pub mod channel;
pub mod noise;
pub mod tables;

pub use channel::{NoiseChannel, ToneChannel};
pub use noise::ShiftRegister;
pub use tables::{update_step, volume_table, MAX_OUTPUT, STEP};

use crate::config::PsgConfig;

/// SN76489 chip state
#[derive(Clone)]
pub struct Sn76489 {
    config: PsgConfig,
    clock: u32,
    sample_rate: u32,
    update_step: i32,
    volume_levels: [i32; 16],
    registers: [u16; 8],
    latched: usize,
    tones: [ToneChannel; 3],
    noise: NoiseChannel,
}

impl Sn76489 {
    /// Create a chip clocked at `clock` Hz producing `sample_rate` samples/s
    pub fn new(clock: u32, sample_rate: u32, config: PsgConfig) -> Self {
        let mut chip = Self {
            config,
            clock,
            sample_rate,
            update_step: update_step(clock, sample_rate),
            volume_levels: volume_table(config.gain),
            registers: [0; 8],
            latched: 0,
            tones: [ToneChannel::new(); 3],
            noise: NoiseChannel::new(config.shift_preset, config.white_noise_taps),
        };
        chip.reset();
        chip
    }

    /// Change the input clock or output rate; register contents survive
    pub fn set_clocks(&mut self, clock: u32, sample_rate: u32) {
        self.clock = clock;
        self.sample_rate = sample_rate;
        self.update_step = update_step(clock, sample_rate);
        for (idx, reg) in [0usize, 2, 4].into_iter().enumerate() {
            self.tones[idx].set_register(self.registers[reg], self.update_step);
        }
        self.apply_noise_control();
    }

    /// Power-on state: all channels silent, registers cleared
    pub fn reset(&mut self) {
        self.registers = [0; 8];
        self.latched = 0;
        for tone in &mut self.tones {
            tone.reset();
        }
        self.noise.reset(self.config.white_noise_taps);
        // Volume registers power up at full attenuation
        for reg in [1, 3, 5, 7] {
            self.registers[reg] = 0x0f;
        }
        // Noise powers up periodic at the fastest rate
        self.apply_noise_control();
    }

    /// Write one byte to the chip
    ///
    /// A byte with bit 7 set latches a register and writes its low 4 bits.
    /// Any other byte writes the upper 6 bits of the latched tone register.
    pub fn write(&mut self, data: u8) {
        if data & 0x80 != 0 {
            let reg = ((data >> 4) & 0x07) as usize;
            self.latched = reg;
            self.registers[reg] = (self.registers[reg] & 0x3f0) | (data & 0x0f) as u16;
            self.apply_register(reg);
        } else {
            let reg = self.latched;
            if matches!(reg, 0 | 2 | 4) {
                self.registers[reg] =
                    (self.registers[reg] & 0x0f) | (((data & 0x3f) as u16) << 4);
                self.apply_register(reg);
            }
        }
    }

    fn apply_register(&mut self, reg: usize) {
        let value = self.registers[reg];
        match reg {
            0 | 2 | 4 => {
                let channel = reg / 2;
                self.tones[channel].set_register(value, self.update_step);
                if channel == 2 {
                    self.noise.follow_tone(self.tones[2].period());
                }
            }
            1 | 3 | 5 => self.tones[reg / 2].set_attenuation(value as u8),
            7 => self.noise.set_attenuation(value as u8),
            6 => self.apply_noise_control(),
            _ => {}
        }
    }

    fn apply_noise_control(&mut self) {
        let control = (self.registers[6] & 0x07) as u8;
        let taps = if control & 0x04 != 0 {
            self.config.white_noise_taps
        } else {
            self.config.periodic_noise_taps
        };
        let rate = control & 0x03;
        let period = if rate == 3 {
            self.tones[2].period() * 2
        } else {
            self.update_step << (5 + rate)
        };
        self.noise.set_control(control, taps, period);
    }

    /// Render `buffer.len()` mono samples in 0..=0x7fff
    pub fn update(&mut self, buffer: &mut [u16]) {
        let length = buffer.len();
        if length == 0 {
            return;
        }

        // Muted channels still advance so they stay in phase
        for tone in &mut self.tones {
            if self.volume_levels[tone.attenuation() as usize] == 0 {
                tone.skip(length);
            }
        }
        if self.volume_levels[self.noise.attenuation() as usize] == 0 {
            self.noise.skip(length);
        }

        let ceiling = MAX_OUTPUT as i64 * STEP as i64;
        for sample in buffer.iter_mut() {
            let mut out: i64 = 0;
            for tone in &mut self.tones {
                let high = tone.high_time() as i64;
                out += high * self.volume_levels[tone.attenuation() as usize] as i64;
            }
            let high = self.noise.high_time() as i64;
            out += high * self.volume_levels[self.noise.attenuation() as usize] as i64;

            *sample = (out.clamp(0, ceiling) / STEP as i64) as u16;
        }
    }

    /// Raw register contents
    pub fn registers(&self) -> &[u16; 8] {
        &self.registers
    }

    /// Tone channel `index` (0-2)
    pub fn tone(&self, index: usize) -> &ToneChannel {
        &self.tones[index]
    }

    /// Noise channel
    pub fn noise(&self) -> &NoiseChannel {
        &self.noise
    }

    /// Samples-per-clock ratio in 16.16 fixed point
    pub fn step(&self) -> i32 {
        self.update_step
    }

    /// Input clock in Hz
    pub fn clock_rate(&self) -> u32 {
        self.clock
    }

    /// Output rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for Sn76489 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sn76489")
            .field("clock", &self.clock)
            .field("sample_rate", &self.sample_rate)
            .field("registers", &self.registers)
            .field("latched", &self.latched)
            .finish_non_exhaustive()
    }
}

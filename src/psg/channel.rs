//! Tone and noise generators
//!
//! Both generators integrate their square wave over one output sample:
//! `high_time()` returns how long (in 16.16 units, at most `STEP`) the
//! output spent high during the sample just produced.

use super::noise::ShiftRegister;
use super::tables::STEP;

/// Square wave tone generator
#[derive(Debug, Clone, Copy)]
pub struct ToneChannel {
    register: u16,
    period: i32,
    count: i32,
    output: bool,
    attenuation: u8,
}

impl ToneChannel {
    /// Silent channel with a zero period
    pub fn new() -> Self {
        Self {
            register: 0,
            period: 0,
            count: 0,
            output: false,
            attenuation: 0x0f,
        }
    }

    /// Load a 10-bit period register
    ///
    /// Periods of 0 and 1 are above the audible range; the chip then holds
    /// the output high, which sample players use for PCM through the
    /// volume register.
    pub fn set_register(&mut self, value: u16, update_step: i32) {
        self.register = value & 0x3ff;
        if self.register <= 1 {
            self.period = 0;
            self.output = true;
        } else {
            self.period = update_step * self.register as i32;
        }
    }

    /// Raw period register
    pub fn register(&self) -> u16 {
        self.register
    }

    /// Period in 16.16 units; zero when held high
    pub fn period(&self) -> i32 {
        self.period
    }

    /// Attenuation index (0 = loudest, 15 = off)
    pub fn attenuation(&self) -> u8 {
        self.attenuation
    }

    /// Set attenuation index
    pub fn set_attenuation(&mut self, value: u8) {
        self.attenuation = value & 0x0f;
    }

    /// Current output level
    pub fn output(&self) -> bool {
        self.output
    }

    /// Keep a muted channel's counter running for `samples` samples
    pub fn skip(&mut self, samples: usize) {
        let span = samples as i32 * STEP;
        if self.count <= span {
            self.count += span;
        }
    }

    /// Integrate one output sample
    #[inline]
    pub fn high_time(&mut self) -> i32 {
        if self.period == 0 {
            return STEP;
        }

        let mut high = 0;
        if self.output {
            high += self.count;
        }
        self.count -= STEP;

        // More than one edge can fall inside a sample at high pitch
        while self.count <= 0 {
            self.count += self.period;
            if self.count > 0 {
                self.output = !self.output;
                if self.output {
                    high += self.period;
                }
                break;
            }
            self.count += self.period;
            high += self.period;
        }

        if self.output {
            high -= self.count;
        }
        high
    }

    /// Back to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ToneChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Noise generator driven by a shift register
#[derive(Debug, Clone, Copy)]
pub struct NoiseChannel {
    control: u8,
    period: i32,
    count: i32,
    output: bool,
    attenuation: u8,
    shifter: ShiftRegister,
}

impl NoiseChannel {
    /// Silent noise channel
    pub fn new(preset: u16, taps: u16) -> Self {
        let shifter = ShiftRegister::new(preset, taps);
        Self {
            control: 0,
            period: 0,
            count: 0,
            output: shifter.output(),
            attenuation: 0x0f,
            shifter,
        }
    }

    /// Apply a noise control write
    ///
    /// `rate_period` is the period picked for the rate bits; the shift
    /// register is reloaded with its preset on every write.
    pub fn set_control(&mut self, control: u8, taps: u16, rate_period: i32) {
        self.control = control & 0x07;
        self.period = rate_period;
        self.shifter.reset(taps);
        self.output = self.shifter.output();
    }

    /// Follow tone channel 2 when the rate bits select it
    pub fn follow_tone(&mut self, tone_period: i32) {
        if self.rate() == 3 {
            self.period = tone_period * 2;
        }
    }

    /// Noise control register (bit 2 = white noise, bits 0-1 = rate)
    pub fn control(&self) -> u8 {
        self.control
    }

    /// Rate bits
    pub fn rate(&self) -> u8 {
        self.control & 0x03
    }

    /// White noise selected
    pub fn is_white(&self) -> bool {
        self.control & 0x04 != 0
    }

    /// Period in 16.16 units
    pub fn period(&self) -> i32 {
        self.period
    }

    /// Attenuation index (0 = loudest, 15 = off)
    pub fn attenuation(&self) -> u8 {
        self.attenuation
    }

    /// Set attenuation index
    pub fn set_attenuation(&mut self, value: u8) {
        self.attenuation = value & 0x0f;
    }

    /// Current output level
    pub fn output(&self) -> bool {
        self.output
    }

    /// Shift register state
    pub fn shifter(&self) -> &ShiftRegister {
        &self.shifter
    }

    /// Keep a muted channel's counter running for `samples` samples
    pub fn skip(&mut self, samples: usize) {
        let span = samples as i32 * STEP;
        if self.count <= span {
            self.count += span;
        }
    }

    /// Integrate one output sample
    #[inline]
    pub fn high_time(&mut self) -> i32 {
        if self.period == 0 {
            return if self.output { STEP } else { 0 };
        }

        let mut high = 0;
        let mut left = STEP;
        loop {
            let next = self.count.min(left).max(0);
            if self.output {
                high += self.count;
            }
            self.count -= next;
            if self.count <= 0 {
                self.output = self.shifter.clock();
                self.count += self.period;
                if self.output {
                    high += self.period;
                }
            }
            if self.output {
                high -= self.count;
            }
            left -= next;
            if left <= 0 {
                break;
            }
        }
        high
    }

    /// Back to power-on state, keeping the shift register preset
    pub fn reset(&mut self, taps: u16) {
        self.control = 0;
        self.period = 0;
        self.count = 0;
        self.attenuation = 0x0f;
        self.shifter.reset(taps);
        self.output = self.shifter.output();
    }
}

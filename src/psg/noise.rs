//! Noise shift register

/// 16-bit linear feedback shift register
///
/// Each clock shifts right by one; the new top bit is the parity of the
/// bits selected by `taps`. The output is the low bit after shifting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRegister {
    value: u16,
    taps: u16,
    preset: u16,
}

impl ShiftRegister {
    /// Create a register loaded with `preset`
    ///
    /// A zero preset would lock the register at zero, so it is replaced by
    /// the top bit.
    pub fn new(preset: u16, taps: u16) -> Self {
        let preset = if preset == 0 { 0x8000 } else { preset };
        Self {
            value: preset,
            taps,
            preset,
        }
    }

    /// Reload the preset and select new taps
    pub fn reset(&mut self, taps: u16) {
        self.value = self.preset;
        self.taps = taps;
    }

    /// Shift once and return the new output bit
    #[inline]
    pub fn clock(&mut self) -> bool {
        let feedback = ((self.value & self.taps).count_ones() & 1) as u16;
        self.value = (self.value >> 1) | (feedback << 15);
        if self.value == 0 {
            self.value = self.preset;
        }
        self.output()
    }

    /// Current output bit
    #[inline]
    pub fn output(&self) -> bool {
        self.value & 1 != 0
    }

    /// Raw register contents
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Active feedback taps
    pub fn taps(&self) -> u16 {
        self.taps
    }
}

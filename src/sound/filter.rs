//! Output filters
//!
//! Each stereo channel runs a first-order high-pass (DC blocker) followed by
//! a second-order low-pass biquad in transposed direct form II. All
//! coefficients are 16.16 fixed point.

/// DC blocker pole, about 0.995
pub const HP_ALPHA: i64 = 0xFEB8;

const UNITY: i64 = 0x10000;

// Full-strength low-pass response
const LP_B0: i64 = 0x1E00;
const LP_B1: i64 = 0x3C00;
const LP_B2: i64 = 0x1E00;
const LP_A1: i64 = -0x6000;
const LP_A2: i64 = 0x0400;

/// Low-pass coefficients scaled to a filter strength
///
/// At 0 % the filter is an exact pass-through; at 100 % it uses the full
/// response. In between, `b0` blends toward unity as the other taps fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiquadCoefficients {
    /// Feed-forward taps
    pub b0: i64,
    /// Feed-forward taps
    pub b1: i64,
    /// Feed-forward taps
    pub b2: i64,
    /// Feedback taps
    pub a1: i64,
    /// Feedback taps
    pub a2: i64,
}

impl BiquadCoefficients {
    /// Coefficients for `percent` strength (clamped to 100)
    pub fn for_percent(percent: u8) -> Self {
        let scale = UNITY * percent.min(100) as i64 / 100;
        Self {
            b0: LP_B0 + (((UNITY - LP_B0) * (UNITY - scale)) >> 16),
            b1: (LP_B1 * scale) >> 16,
            b2: (LP_B2 * scale) >> 16,
            a1: (LP_A1 * scale) >> 16,
            a2: (LP_A2 * scale) >> 16,
        }
    }

    /// Exact pass-through
    pub fn is_bypass(&self) -> bool {
        self.b0 == UNITY && self.b1 == 0 && self.b2 == 0 && self.a1 == 0 && self.a2 == 0
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::for_percent(0)
    }
}

/// First-order high-pass
#[derive(Debug, Clone, Copy, Default)]
pub struct DcBlocker {
    prev_in: i64,
    prev_out: i64,
}

impl DcBlocker {
    /// Create a blocker at rest
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, input: i32) -> i32 {
        let x = input as i64;
        let out = (HP_ALPHA * (self.prev_out + x - self.prev_in)) >> 16;
        self.prev_in = x;
        self.prev_out = out;
        out as i32
    }

    /// Clear history
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Second-order low-pass, transposed direct form II
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPass {
    z1: i64,
    z2: i64,
}

impl LowPass {
    /// Create a filter at rest
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, input: i32, c: &BiquadCoefficients) -> i32 {
        let x = input as i64;
        let out = ((c.b0 * x) >> 16) + (self.z1 >> 16);
        self.z1 = c.b1 * x + self.z2 - c.a1 * out;
        self.z2 = c.b2 * x - c.a2 * out;
        out as i32
    }

    /// Clear delay line
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Filter chain for one output channel
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelFilter {
    dc: DcBlocker,
    low_pass: LowPass,
}

impl ChannelFilter {
    /// High-pass then low-pass one sample
    #[inline]
    pub fn process(&mut self, input: i32, c: &BiquadCoefficients) -> i32 {
        let hp = self.dc.process(input);
        self.low_pass.process(hp, c)
    }

    /// Clear both stages
    pub fn reset(&mut self) {
        self.dc.reset();
        self.low_pass.reset();
    }
}

/// Stereo filter state plus the active coefficients
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterState {
    /// Left channel chain
    pub left: ChannelFilter,
    /// Right channel chain
    pub right: ChannelFilter,
    coefficients: BiquadCoefficients,
}

impl FilterState {
    /// Filters at rest with strength `percent`
    pub fn new(percent: u8) -> Self {
        Self {
            left: ChannelFilter::default(),
            right: ChannelFilter::default(),
            coefficients: BiquadCoefficients::for_percent(percent),
        }
    }

    /// Change strength; history is kept
    pub fn set_strength(&mut self, percent: u8) {
        self.coefficients = BiquadCoefficients::for_percent(percent);
    }

    /// Active coefficients
    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    /// Filter one stereo frame
    #[inline]
    pub fn process(&mut self, left: i32, right: i32) -> (i32, i32) {
        let c = self.coefficients;
        (self.left.process(left, &c), self.right.process(right, &c))
    }

    /// Clear all history
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

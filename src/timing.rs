//! Region timing and the main CPU clock domain
//!
//! Every per-line and per-field quantity the scheduler and the sound pipeline
//! use is derived here from the region's master clock, so switching region
//! only means rebuilding one [`FrameTiming`].

use serde::{Deserialize, Serialize};

/// NTSC master crystal (Hz)
pub const NTSC_MASTER_CLOCK: u32 = 53_693_175;
/// PAL master crystal (Hz)
pub const PAL_MASTER_CLOCK: u32 = 53_203_424;

const MAIN_CPU_DIVIDER: u32 = 7;
const PSG_DIVIDER: u32 = 15;

/// Event offsets are expressed against a nominal 488-clock line
const REFERENCE_LINE_CLOCKS: u64 = 488;
const VINT_OFFSET: u64 = 20;
const HINT_OFFSET: u64 = 400;
const HDISPLAY_OFFSET: u64 = 440;

/// Video region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// 60 Hz, 262 lines
    #[default]
    Ntsc,
    /// 50 Hz, 313 lines
    Pal,
}

impl Region {
    /// Timing table for this region
    pub fn timing(self) -> FrameTiming {
        FrameTiming::for_region(self)
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Ntsc => write!(f, "NTSC"),
            Region::Pal => write!(f, "PAL"),
        }
    }
}

/// Clock offsets of the in-line events, relative to the start of the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOffsets {
    /// V-int check point
    pub vint: u64,
    /// H-int processing point
    pub hint: u64,
    /// Horizontal display (line render) point
    pub hdisplay: u64,
    /// End of line
    pub line_end: u64,
}

/// Derived timing for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Region these values were derived for
    pub region: Region,
    /// Master crystal frequency (Hz)
    pub master_clock: u32,
    /// Main CPU clock (Hz)
    pub cpu_clock: u32,
    /// PSG input clock (Hz)
    pub psg_clock: u32,
    /// Fields per second
    pub field_rate: u32,
    /// Scanlines per field
    pub total_lines: u32,
    /// First visible line (inclusive)
    pub visible_start: u32,
    /// One past the last visible line; V-int fires on this line
    pub visible_end: u32,
    /// Main CPU clocks per scanline
    pub clocks_per_line: u32,
}

impl FrameTiming {
    /// NTSC timing
    pub fn ntsc() -> Self {
        Self::build(Region::Ntsc, NTSC_MASTER_CLOCK, 60, 262, 224)
    }

    /// PAL timing
    pub fn pal() -> Self {
        Self::build(Region::Pal, PAL_MASTER_CLOCK, 50, 313, 240)
    }

    /// Timing for `region`
    pub fn for_region(region: Region) -> Self {
        match region {
            Region::Ntsc => Self::ntsc(),
            Region::Pal => Self::pal(),
        }
    }

    fn build(region: Region, master_clock: u32, field_rate: u32, total_lines: u32, visible: u32) -> Self {
        let cpu_clock = master_clock / MAIN_CPU_DIVIDER;
        Self {
            region,
            master_clock,
            cpu_clock,
            psg_clock: master_clock / PSG_DIVIDER,
            field_rate,
            total_lines,
            visible_start: 0,
            visible_end: visible,
            clocks_per_line: cpu_clock / field_rate / total_lines,
        }
    }

    /// Whether `line` is inside the active display
    #[inline]
    pub fn is_visible(&self, line: u32) -> bool {
        line >= self.visible_start && line < self.visible_end
    }

    /// The line before the first visible line, wrapping to the previous field
    pub fn pre_visible_line(&self) -> u32 {
        (self.visible_start + self.total_lines - 1) % self.total_lines
    }

    /// Number of visible lines
    pub fn visible_lines(&self) -> u32 {
        self.visible_end - self.visible_start
    }

    /// In-line event offsets scaled to this region's line length
    pub fn line_offsets(&self) -> LineOffsets {
        let cpl = self.clocks_per_line as u64;
        LineOffsets {
            vint: cpl * VINT_OFFSET / REFERENCE_LINE_CLOCKS,
            hint: cpl * HINT_OFFSET / REFERENCE_LINE_CLOCKS,
            hdisplay: cpl * HDISPLAY_OFFSET / REFERENCE_LINE_CLOCKS,
            line_end: cpl,
        }
    }

    /// Main CPU clocks per field
    pub fn clocks_per_field(&self) -> u64 {
        self.clocks_per_line as u64 * self.total_lines as u64
    }

    /// Audio samples produced per field at `sample_rate`
    pub fn samples_per_field(&self, sample_rate: u32) -> usize {
        (sample_rate / self.field_rate) as usize
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::ntsc()
    }
}

/// Main CPU clock domain
///
/// `clocks` is the running CPU clock. `remaining` is the signed budget until
/// the next scheduled event; it goes to zero or below when the event is due.
/// The CPU may move `clocks` in the middle of a block without touching
/// `remaining`; the block is settled against `remaining` when it completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockDomain {
    clocks: u64,
    remaining: i64,
}

impl ClockDomain {
    /// Create a clock domain at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current CPU clock
    #[inline]
    pub fn now(&self) -> u64 {
        self.clocks
    }

    /// Clocks until the next event (may be negative)
    #[inline]
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Move the clock forward without settling the event budget
    #[inline]
    pub fn tick(&mut self, cycles: u64) {
        self.clocks += cycles;
    }

    /// Charge `cycles` against the event budget
    #[inline]
    pub fn settle(&mut self, cycles: u64) {
        self.remaining -= cycles as i64;
    }

    /// Move the clock and charge the budget in one step
    #[inline]
    pub fn consume(&mut self, cycles: u64) {
        self.tick(cycles);
        self.settle(cycles);
    }

    /// Signed distance from now to `deadline`
    #[inline]
    pub fn until(&self, deadline: u64) -> i64 {
        deadline as i64 - self.clocks as i64
    }

    /// Re-arm the budget so it expires at `deadline`
    #[inline]
    pub fn arm(&mut self, deadline: u64) {
        self.remaining = self.until(deadline);
    }

    /// Force the clock to an exact value
    #[inline]
    pub fn snap_to(&mut self, clocks: u64) {
        self.clocks = clocks;
    }

    /// Adjust the budget by a signed amount
    #[inline]
    pub fn adjust_remaining(&mut self, delta: i64) {
        self.remaining += delta;
    }

    /// Reset to zero
    pub fn reset(&mut self) {
        self.clocks = 0;
        self.remaining = 0;
    }
}

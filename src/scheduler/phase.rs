//! Scanline phases and their deadlines

use crate::timing::LineOffsets;

/// Position within a scanline
///
/// After the first line of a hard reset the cycle is
/// `VintCheck -> HintProcess -> HDisplay -> LineEnd -> VintCheck`;
/// the line-start bookkeeping runs inline at each line wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Field/line start bookkeeping (only pending right after a hard reset)
    LineStart,
    /// V-int check point
    VintCheck,
    /// H-int countdown and DMA throttle
    HintProcess,
    /// Line render point
    HDisplay,
    /// End of line: FIFO, sound, line advance
    LineEnd,
}

impl Phase {
    /// Numeric phase (0-4)
    pub fn index(self) -> u8 {
        match self {
            Phase::LineStart => 0,
            Phase::VintCheck => 1,
            Phase::HintProcess => 2,
            Phase::HDisplay => 3,
            Phase::LineEnd => 4,
        }
    }

    /// Phase that follows this one
    pub fn next(self) -> Phase {
        match self {
            Phase::LineStart => Phase::VintCheck,
            Phase::VintCheck => Phase::HintProcess,
            Phase::HintProcess => Phase::HDisplay,
            Phase::HDisplay => Phase::LineEnd,
            Phase::LineEnd => Phase::VintCheck,
        }
    }
}

/// Absolute clock timestamps of the current line's events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadlines {
    /// Start of the line
    pub line_start: u64,
    /// V-int check
    pub vint: u64,
    /// H-int processing
    pub hint: u64,
    /// Line render
    pub hdisplay: u64,
    /// End of the line
    pub line_end: u64,
}

impl Deadlines {
    /// Deadlines for a line starting at `start`
    pub fn at(start: u64, offsets: &LineOffsets) -> Self {
        Self {
            line_start: start,
            vint: start + offsets.vint,
            hint: start + offsets.hint,
            hdisplay: start + offsets.hdisplay,
            line_end: start + offsets.line_end,
        }
    }

    /// Deadline that `phase` waits for
    #[inline]
    pub fn for_phase(&self, phase: Phase) -> u64 {
        match phase {
            Phase::LineStart => self.line_start,
            Phase::VintCheck => self.vint,
            Phase::HintProcess => self.hint,
            Phase::HDisplay => self.hdisplay,
            Phase::LineEnd => self.line_end,
        }
    }

    /// Move every deadline forward by `clocks`
    pub fn advance(&mut self, clocks: u64) {
        self.line_start += clocks;
        self.vint += clocks;
        self.hint += clocks;
        self.hdisplay += clocks;
        self.line_end += clocks;
    }
}

//! DMA transfer throttle

/// Bytes a DMA moves in one scanline
///
/// Blanked (vblank or display off) lines transfer far more than active ones;
/// 40-cell mode transfers more than 32-cell mode.
#[inline]
pub fn bytes_per_line(blanked: bool, h40: bool) -> u32 {
    match (blanked, h40) {
        (true, true) => 205,
        (true, false) => 167,
        (false, true) => 18,
        (false, false) => 16,
    }
}

/// Remaining DMA work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaThrottle {
    remaining: u32,
    busy: bool,
    transferred: u64,
}

impl DmaThrottle {
    /// Idle throttle
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a transfer of `bytes`; a zero-length transfer is ignored
    pub fn start(&mut self, bytes: u32) {
        if bytes == 0 {
            return;
        }
        self.remaining = self.remaining.saturating_add(bytes);
        self.busy = true;
    }

    /// Transfer one scanline's worth
    ///
    /// # Returns
    ///
    /// Bytes transferred this line
    pub fn throttle(&mut self, blanked: bool, h40: bool) -> u32 {
        if !self.busy {
            return 0;
        }
        let moved = bytes_per_line(blanked, h40).min(self.remaining);
        self.consume(moved);
        moved
    }

    /// Account for `bytes` moved outside the per-line throttle
    pub fn consume(&mut self, bytes: u32) {
        let moved = bytes.min(self.remaining);
        self.remaining -= moved;
        self.transferred += moved as u64;
        if self.remaining == 0 && self.busy {
            self.busy = false;
            log::debug!("dma: transfer complete ({} bytes total)", self.transferred);
        }
    }

    /// Bytes still to move
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Transfer in progress
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Bytes moved since reset
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Drop any transfer in progress
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

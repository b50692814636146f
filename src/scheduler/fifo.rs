//! VDP write FIFO occupancy

/// Entries the FIFO holds
pub const FIFO_DEPTH: u8 = 4;

/// Occupancy model of the 4-entry VDP write FIFO
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteFifo {
    entries: u8,
}

impl WriteFifo {
    /// Empty FIFO
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one write
    ///
    /// # Returns
    ///
    /// `false` when the FIFO was already full; the CPU would stall
    pub fn push(&mut self) -> bool {
        if self.entries >= FIFO_DEPTH {
            return false;
        }
        self.entries += 1;
        true
    }

    /// Retire up to `n` entries
    pub fn drain(&mut self, n: u8) {
        self.entries = self.entries.saturating_sub(n);
    }

    /// Queued writes
    pub fn len(&self) -> u8 {
        self.entries
    }

    /// Nothing queued
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// No room left
    pub fn is_full(&self) -> bool {
        self.entries >= FIFO_DEPTH
    }

    /// Empty the FIFO
    pub fn clear(&mut self) {
        self.entries = 0;
    }
}

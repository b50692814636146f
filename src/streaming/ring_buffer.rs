//! Ring buffer between the emulation thread and the audio callback
//!
//! One producer (the emulator, once per field) and one consumer (the audio
//! device callback). Each stereo frame is packed into a single `AtomicU32`
//! slot, so neither side ever takes a lock:
//! - the producer writes slots, then publishes its cursor with Release
//! - the consumer loads that cursor with Acquire, reads slots, then
//!   publishes its own cursor with Release
//!
//! Memory consumption is fixed at capacity * 4 bytes. One slot always stays
//! empty, so at most `capacity - 1` frames are buffered.

use crate::{Result, SyncError};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// One stereo sample pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoFrame {
    /// Left sample
    pub left: i16,
    /// Right sample
    pub right: i16,
}

impl StereoFrame {
    /// Build a frame
    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    #[inline]
    fn pack(self) -> u32 {
        (self.left as u16 as u32) | ((self.right as u16 as u32) << 16)
    }

    #[inline]
    fn unpack(word: u32) -> Self {
        Self {
            left: word as u16 as i16,
            right: (word >> 16) as u16 as i16,
        }
    }
}

struct Shared {
    slots: Box<[AtomicU32]>,
    capacity: usize,
    mask: usize,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    dropped: AtomicU64,
    underruns: AtomicU64,
}

impl Shared {
    fn buffered(&self) -> usize {
        // Read cursor first: the write cursor can only be ahead of it
        let read = self.read_pos.load(Ordering::Acquire);
        let write = self.write_pos.load(Ordering::Acquire);
        write.wrapping_sub(read).min(self.capacity - 1)
    }
}

/// Lock-free stereo ring buffer
///
/// Created whole, then [`split`](RingBuffer::split) into its two halves.
pub struct RingBuffer {
    shared: Arc<Shared>,
}

impl RingBuffer {
    /// Create a ring buffer
    /// Capacity will be rounded up to the next power of 2 (at least 2)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Requested capacity is 0
    /// - Requested capacity would exceed maximum safe allocation (512 MB)
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(SyncError::ConfigError(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }

        const MAX_CAPACITY: usize = 512 * 1024 * 1024 / std::mem::size_of::<u32>();
        if requested_capacity > MAX_CAPACITY {
            return Err(SyncError::ConfigError(format!(
                "Ring buffer capacity {requested_capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }
        let capacity = requested_capacity.next_power_of_two().max(2);

        let slots: Box<[AtomicU32]> = (0..capacity).map(|_| AtomicU32::new(0)).collect();
        Ok(Self {
            shared: Arc::new(Shared {
                slots,
                capacity,
                mask: capacity - 1,
                write_pos: AtomicUsize::new(0),
                read_pos: AtomicUsize::new(0),
                dropped: AtomicU64::new(0),
                underruns: AtomicU64::new(0),
            }),
        })
    }

    /// Slot count (power of 2)
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Observer that can be cloned into any thread
    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Split into producer and consumer halves
    pub fn split(self) -> (Producer, Consumer) {
        (
            Producer {
                shared: Arc::clone(&self.shared),
            },
            Consumer {
                shared: self.shared,
            },
        )
    }
}

/// Writing half, owned by the emulation thread
pub struct Producer {
    shared: Arc<Shared>,
}

impl Producer {
    /// Append frames; whatever does not fit is dropped
    ///
    /// # Returns
    ///
    /// Number of frames accepted
    pub fn produce(&mut self, frames: &[StereoFrame]) -> usize {
        let shared = &*self.shared;
        let write = shared.write_pos.load(Ordering::Relaxed);
        let read = shared.read_pos.load(Ordering::Acquire);
        let free = shared.capacity - 1 - write.wrapping_sub(read);

        let accepted = frames.len().min(free);
        for (i, frame) in frames[..accepted].iter().enumerate() {
            shared.slots[write.wrapping_add(i) & shared.mask].store(frame.pack(), Ordering::Relaxed);
        }
        shared
            .write_pos
            .store(write.wrapping_add(accepted), Ordering::Release);

        if accepted < frames.len() {
            shared
                .dropped
                .fetch_add((frames.len() - accepted) as u64, Ordering::Relaxed);
        }
        accepted
    }

    /// Append a field given as separate channels
    pub fn produce_channels(&mut self, left: &[i16], right: &[i16]) -> usize {
        let shared = &*self.shared;
        let len = left.len().min(right.len());
        let write = shared.write_pos.load(Ordering::Relaxed);
        let read = shared.read_pos.load(Ordering::Acquire);
        let free = shared.capacity - 1 - write.wrapping_sub(read);

        let accepted = len.min(free);
        for (i, (&l, &r)) in left.iter().zip(right).take(accepted).enumerate() {
            shared.slots[write.wrapping_add(i) & shared.mask]
                .store(StereoFrame::new(l, r).pack(), Ordering::Relaxed);
        }
        shared
            .write_pos
            .store(write.wrapping_add(accepted), Ordering::Release);

        if accepted < len {
            shared
                .dropped
                .fetch_add((len - accepted) as u64, Ordering::Relaxed);
        }
        accepted
    }

    /// Frames currently buffered
    pub fn buffered_count(&self) -> usize {
        self.shared.buffered()
    }

    /// Free slots
    pub fn free_count(&self) -> usize {
        self.shared.capacity - 1 - self.shared.buffered()
    }
}

/// Reading half, owned by the audio callback
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Consumer {
    /// Fill `out` with buffered frames; the shortfall is zero-filled
    ///
    /// # Returns
    ///
    /// Number of real frames read
    pub fn consume(&mut self, out: &mut [StereoFrame]) -> usize {
        let shared = &*self.shared;
        let read = shared.read_pos.load(Ordering::Relaxed);
        let write = shared.write_pos.load(Ordering::Acquire);
        let available = write.wrapping_sub(read);

        let taken = out.len().min(available);
        for (i, frame) in out[..taken].iter_mut().enumerate() {
            *frame = StereoFrame::unpack(
                shared.slots[read.wrapping_add(i) & shared.mask].load(Ordering::Relaxed),
            );
        }
        shared
            .read_pos
            .store(read.wrapping_add(taken), Ordering::Release);

        if taken < out.len() {
            out[taken..].fill(StereoFrame::default());
            shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    /// Fill an interleaved L/R buffer; an odd trailing sample is zeroed
    pub fn consume_interleaved(&mut self, out: &mut [i16]) -> usize {
        let shared = &*self.shared;
        let read = shared.read_pos.load(Ordering::Relaxed);
        let write = shared.write_pos.load(Ordering::Acquire);
        let available = write.wrapping_sub(read);

        let wanted = out.len() / 2;
        let taken = wanted.min(available);
        for (i, pair) in out.chunks_exact_mut(2).take(taken).enumerate() {
            let frame = StereoFrame::unpack(
                shared.slots[read.wrapping_add(i) & shared.mask].load(Ordering::Relaxed),
            );
            pair[0] = frame.left;
            pair[1] = frame.right;
        }
        shared
            .read_pos
            .store(read.wrapping_add(taken), Ordering::Release);

        out[taken * 2..].fill(0);
        if taken < wanted {
            shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        taken
    }

    /// Discard everything buffered
    pub fn flush(&mut self) {
        let write = self.shared.write_pos.load(Ordering::Acquire);
        self.shared.read_pos.store(write, Ordering::Release);
    }

    /// Frames currently buffered
    pub fn buffered_count(&self) -> usize {
        self.shared.buffered()
    }
}

/// Read-only view of the buffer counters
#[derive(Clone)]
pub struct RingMonitor {
    shared: Arc<Shared>,
}

impl RingMonitor {
    /// Frames currently buffered
    pub fn buffered_count(&self) -> usize {
        self.shared.buffered()
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames dropped because the buffer was full
    pub fn dropped_frames(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Reads that came up short
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Relaxed)
    }

    /// Fill level (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        self.buffered_count() as f32 / self.shared.capacity as f32
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.shared.capacity)
            .field("buffered", &self.shared.buffered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(values: std::ops::Range<i16>) -> Vec<StereoFrame> {
        values.map(|v| StereoFrame::new(v, -v)).collect()
    }

    #[test]
    fn test_ring_buffer_creation() {
        let rb = RingBuffer::new(1024).unwrap();
        assert_eq!(rb.capacity(), 1024);
        assert_eq!(rb.monitor().buffered_count(), 0);
    }

    #[test]
    fn test_ring_buffer_power_of_two() {
        assert_eq!(RingBuffer::new(1000).unwrap().capacity(), 1024);
        assert_eq!(RingBuffer::new(1).unwrap().capacity(), 2);
    }

    #[test]
    fn test_pack_preserves_sign() {
        for frame in [
            StereoFrame::new(-1, 1),
            StereoFrame::new(i16::MIN, i16::MAX),
            StereoFrame::new(0, -32767),
        ] {
            assert_eq!(StereoFrame::unpack(frame.pack()), frame);
        }
    }

    #[test]
    fn test_produce_and_consume() {
        let (mut tx, mut rx) = RingBuffer::new(16).unwrap().split();
        let input = frames(1..5);
        assert_eq!(tx.produce(&input), 4);
        assert_eq!(rx.buffered_count(), 4);

        let mut out = vec![StereoFrame::default(); 4];
        assert_eq!(rx.consume(&mut out), 4);
        assert_eq!(out, input);
        assert_eq!(tx.buffered_count(), 0);
    }

    #[test]
    fn test_overrun_drops_excess() {
        let rb = RingBuffer::new(8).unwrap();
        let monitor = rb.monitor();
        let (mut tx, _rx) = rb.split();
        assert_eq!(tx.produce(&frames(0..10)), 7);
        assert_eq!(monitor.buffered_count(), 7);
        assert_eq!(monitor.dropped_frames(), 3);
        assert_eq!(tx.free_count(), 0);
    }

    #[test]
    fn test_underrun_zero_fills() {
        let rb = RingBuffer::new(8).unwrap();
        let monitor = rb.monitor();
        let (mut tx, mut rx) = rb.split();
        tx.produce(&frames(1..3));

        let mut out = vec![StereoFrame::new(9, 9); 5];
        assert_eq!(rx.consume(&mut out), 2);
        assert_eq!(out[0], StereoFrame::new(1, -1));
        assert!(out[2..].iter().all(|f| *f == StereoFrame::default()));
        assert_eq!(monitor.underruns(), 1);
    }

    #[test]
    fn test_wrap_around_keeps_order() {
        let (mut tx, mut rx) = RingBuffer::new(8).unwrap().split();
        let mut out = vec![StereoFrame::default(); 5];
        let mut next = 0i16;
        for _ in 0..10 {
            let batch = frames(next..next + 5);
            assert_eq!(tx.produce(&batch), 5);
            rx.consume(&mut out);
            assert_eq!(out, batch);
            next += 5;
        }
    }

    #[test]
    fn test_interleaved_read() {
        let (mut tx, mut rx) = RingBuffer::new(8).unwrap().split();
        tx.produce_channels(&[1, 2, 3], &[-1, -2, -3]);
        let mut out = [7i16; 8];
        assert_eq!(rx.consume_interleaved(&mut out), 3);
        assert_eq!(out, [1, -1, 2, -2, 3, -3, 0, 0]);
    }

    #[test]
    fn test_flush() {
        let (mut tx, mut rx) = RingBuffer::new(16).unwrap().split();
        tx.produce(&frames(0..8));
        rx.flush();
        assert_eq!(rx.buffered_count(), 0);
    }

    #[test]
    fn test_zero_capacity_error() {
        let result = RingBuffer::new(0);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("greater than 0"));
    }

    #[test]
    fn test_max_capacity_exceeded() {
        let max_plus_one = (512 * 1024 * 1024 / std::mem::size_of::<u32>()) + 1;
        let result = RingBuffer::new(max_plus_one);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }
}

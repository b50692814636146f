//! Platform audio implementations
//!
//! [`RingOutput`] is the emulator side: it implements
//! [`AudioOutput`](crate::bus::AudioOutput) by feeding a ring buffer.
//! [`RingSource`] is the device side that drains it. [`NullOutput`] runs
//! headless.

use super::ring_buffer::{Consumer, Producer, RingBuffer, RingMonitor};
use super::StreamConfig;
use crate::bus::AudioOutput;
use crate::Result;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Dropped-sample warnings before the log drops to debug level
const DROP_WARNINGS: u32 = 5;

/// Interleaved samples fetched per device refill
const SOURCE_BATCH: usize = 2048;

/// Playback state shared by both sides of the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    /// Not started, or stopped
    Stopped = 0,
    /// Playing
    Playing = 1,
    /// Paused; the device plays silence without draining
    Paused = 2,
}

/// Lock-free handle on the [`PlaybackState`]
#[derive(Debug, Clone)]
pub struct PlaybackControl(Arc<AtomicU8>);

impl PlaybackControl {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PlaybackState::Stopped as u8)))
    }

    /// Current state
    pub fn state(&self) -> PlaybackState {
        match self.0.load(Ordering::Acquire) {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }

    fn set(&self, state: PlaybackState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Output statistics for monitoring buffer health
#[derive(Debug, Clone, Default)]
pub struct OutputStats {
    /// Fields handed to the ring
    pub fields_output: u64,
    /// Frames that did not fit
    pub frames_dropped: u64,
    /// Frames buffered after the last field
    pub buffered: usize,
    /// Ring fill after the last field (0.0 to 1.0)
    pub fill_percentage: f32,
}

/// Ring-backed platform audio
pub struct RingOutput {
    producer: Producer,
    monitor: RingMonitor,
    control: PlaybackControl,
    stats: Arc<Mutex<OutputStats>>,
    prefill_frames: usize,
    drop_warnings: u32,
}

impl RingOutput {
    /// Build the ring and return both ends
    ///
    /// `samples_per_field` sizes the silence queued by `start()`.
    pub fn new(config: &StreamConfig, sample_rate: u32, samples_per_field: usize) -> Result<(Self, RingSource)> {
        let ring = RingBuffer::new(config.ring_buffer_size)?;
        let monitor = ring.monitor();
        let (producer, consumer) = ring.split();
        let control = PlaybackControl::new();

        let output = Self {
            producer,
            monitor: monitor.clone(),
            control: control.clone(),
            stats: Arc::new(Mutex::new(OutputStats::default())),
            prefill_frames: samples_per_field * config.prefill_fields as usize,
            drop_warnings: 0,
        };
        let source = RingSource::new(consumer, control, sample_rate);
        Ok((output, source))
    }

    /// Playback state handle
    pub fn control(&self) -> PlaybackControl {
        self.control.clone()
    }

    /// Ring counters
    pub fn monitor(&self) -> RingMonitor {
        self.monitor.clone()
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> OutputStats {
        self.stats.lock().clone()
    }

    /// Statistics handle for another thread
    pub fn stats_handle(&self) -> Arc<Mutex<OutputStats>> {
        Arc::clone(&self.stats)
    }
}

impl AudioOutput for RingOutput {
    fn start(&mut self) -> Result<()> {
        let queued = self.producer.buffered_count();
        if queued < self.prefill_frames {
            let silence = vec![0i16; self.prefill_frames - queued];
            self.producer.produce_channels(&silence, &silence);
        }
        self.control.set(PlaybackState::Playing);
        info!(
            "audio: started with {} frames queued",
            self.producer.buffered_count()
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.control.set(PlaybackState::Stopped);
        info!("audio: stopped");
    }

    fn pause(&mut self) {
        if self.control.state() == PlaybackState::Playing {
            self.control.set(PlaybackState::Paused);
            debug!("audio: paused");
        }
    }

    fn resume(&mut self) {
        if self.control.state() == PlaybackState::Paused {
            self.control.set(PlaybackState::Playing);
            debug!("audio: resumed");
        }
    }

    fn output(&mut self, left: &[i16], right: &[i16]) {
        if self.control.state() == PlaybackState::Stopped {
            trace!("audio: field discarded while stopped");
            return;
        }

        let accepted = self.producer.produce_channels(left, right);
        let dropped = left.len().min(right.len()) - accepted;
        if dropped > 0 {
            if self.drop_warnings < DROP_WARNINGS {
                self.drop_warnings += 1;
                warn!("audio: ring full, dropped {dropped} frames");
            } else {
                debug!("audio: ring full, dropped {dropped} frames");
            }
        }

        let mut stats = self.stats.lock();
        stats.fields_output += 1;
        stats.frames_dropped += dropped as u64;
        stats.buffered = self.producer.buffered_count();
        stats.fill_percentage = self.monitor.fill_percentage();
    }

    fn buffered_count(&self) -> usize {
        self.producer.buffered_count()
    }
}

/// Device side of a [`RingOutput`]
///
/// Yields interleaved stereo samples; plays silence while paused, stopped
/// or starved.
pub struct RingSource {
    consumer: Consumer,
    control: PlaybackControl,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    buffer: Vec<i16>,
    buffer_pos: usize,
}

impl RingSource {
    fn new(consumer: Consumer, control: PlaybackControl, sample_rate: u32) -> Self {
        Self {
            consumer,
            control,
            sample_rate,
            finished: Arc::new(AtomicBool::new(false)),
            buffer: vec![0; SOURCE_BATCH],
            // Start by reading a new batch
            buffer_pos: SOURCE_BATCH,
        }
    }

    /// Fill an interleaved L/R buffer
    ///
    /// # Returns
    ///
    /// Stereo frames taken from the ring (the rest is silence)
    pub fn fill(&mut self, out: &mut [i16]) -> usize {
        if self.control.state() != PlaybackState::Playing {
            out.fill(0);
            return 0;
        }
        self.consumer.consume_interleaved(out)
    }

    /// Output rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Flag that ends iteration once set
    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }
}

impl Iterator for RingSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.buffer_pos >= self.buffer.len() {
            let mut batch = std::mem::take(&mut self.buffer);
            self.fill(&mut batch);
            self.buffer = batch;
            self.buffer_pos = 0;
        }

        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Headless platform audio: accepts everything, buffers nothing
#[derive(Debug, Clone, Default)]
pub struct NullOutput {
    started: bool,
    fields: u64,
}

impl NullOutput {
    /// Fields received
    pub fn fields(&self) -> u64 {
        self.fields
    }

    /// Whether `start()` has been called since the last `stop()`
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl AudioOutput for NullOutput {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.started = false;
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn output(&mut self, _left: &[i16], _right: &[i16]) {
        self.fields += 1;
    }

    fn buffered_count(&self) -> usize {
        0
    }
}

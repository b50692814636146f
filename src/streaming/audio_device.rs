//! Audio device integration using rodio
//!
//! Plays a [`RingSource`] on the system's default output. The device pulls
//! from the ring on its own thread; the emulator keeps pushing fields through
//! the matching [`RingOutput`](super::RingOutput).

use super::RingSource;
use crate::{Result, SyncError};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CHANNELS: u16 = 2;

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        // Stream continues indefinitely; report a fixed chunk size
        Some(4096)
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        RingSource::sample_rate(self)
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output and start pulling from `source`
    ///
    /// # Errors
    ///
    /// Fails when no output device is available or the sink cannot be
    /// created.
    pub fn new(source: RingSource) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| SyncError::AudioDeviceError(format!("Failed to create audio stream: {e}")))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| SyncError::AudioDeviceError(format!("Failed to create audio sink: {e}")))?;

        let finished = source.finished_flag();
        log::info!("audio device: {} Hz stereo", source.sample_rate());
        sink.append(source);

        Ok(AudioDevice {
            _stream: stream,
            sink,
            running: Arc::new(AtomicBool::new(true)),
            finished,
        })
    }

    /// Pause the device
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume the device
    pub fn play(&self) {
        self.sink.play();
    }

    /// Check if audio device is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Signal that no more samples will be produced
    /// The source ends instead of playing silence forever
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.pause();
        self.finish();
        self.running.store(false, Ordering::Relaxed);
    }
}

//! Audio output and streaming
//!
//! The emulator pushes one field of audio at a time; a real-time device pulls
//! it from a lock-free ring buffer at its own pace. The platform side is
//! abstracted by [`crate::bus::AudioOutput`]; this module provides the
//! ring-backed implementation, a headless one, and (behind features) a
//! rodio device and a WAV recorder.

pub mod output;
pub mod ring_buffer;

#[cfg(feature = "streaming")]
pub mod audio_device;
#[cfg(feature = "export-wav")]
pub mod wav;

pub use output::{NullOutput, OutputStats, PlaybackControl, PlaybackState, RingOutput, RingSource};
pub use ring_buffer::{Consumer, Producer, RingBuffer, RingMonitor, StereoFrame};

#[cfg(feature = "streaming")]
pub use audio_device::AudioDevice;
#[cfg(feature = "export-wav")]
pub use wav::WavRecorder;

use serde::{Deserialize, Serialize};

/// Configuration for streaming playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Size of the ring buffer in stereo frames
    /// Must comfortably exceed twice the feedback threshold, or frame
    /// pacing can never see the buffer as over-full
    pub ring_buffer_size: usize,

    /// Fields of silence queued when playback starts
    pub prefill_fields: u32,
}

impl StreamConfig {
    /// Small buffer: 8192 frames ≈ 186ms @ 44.1kHz
    pub fn low_latency() -> Self {
        StreamConfig {
            ring_buffer_size: 8192,
            prefill_fields: 3,
        }
    }

    /// Large buffer: 16384 frames ≈ 372ms @ 44.1kHz
    pub fn stable() -> Self {
        StreamConfig {
            ring_buffer_size: 16384,
            prefill_fields: 3,
        }
    }

    /// Ring latency in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        ((self.ring_buffer_size as f32) / (sample_rate as f32)) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_latency() {
        let config = StreamConfig::low_latency();
        let latency = config.latency_ms(44_100);
        assert!(latency > 180.0 && latency < 190.0);
    }

    #[test]
    fn test_stable_holds_pacing_headroom() {
        // Twice the default threshold: 2 * 5 fields * 735 frames
        assert!(StreamConfig::stable().ring_buffer_size > 2 * 5 * 735);
    }
}

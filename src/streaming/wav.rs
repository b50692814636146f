//! WAV recording through the platform audio interface

use crate::bus::AudioOutput;
use crate::{Result, SyncError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Platform audio that writes every field to a 16-bit stereo WAV file
///
/// Nothing is ever buffered for playback, so feedback always asks for more
/// and the emulator runs as fast as it can. Write errors are kept and
/// reported by [`finalize`](WavRecorder::finalize).
pub struct WavRecorder {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    error: Option<String>,
    frames: u64,
    recording: bool,
}

impl WavRecorder {
    /// Create the output file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use genesis_sync::streaming::WavRecorder;
    ///
    /// # fn main() -> genesis_sync::Result<()> {
    /// let recorder = WavRecorder::create("capture.wav", 44_100)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| SyncError::AudioFileError(format!("Failed to create WAV file: {e}")))?;
        Ok(Self {
            writer: Some(writer),
            error: None,
            frames: 0,
            recording: false,
        })
    }

    /// Stereo frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush and close the file
    pub fn finalize(mut self) -> Result<()> {
        if let Some(err) = self.error.take() {
            return Err(SyncError::AudioFileError(err));
        }
        match self.writer.take() {
            Some(writer) => writer
                .finalize()
                .map_err(|e| SyncError::AudioFileError(format!("Failed to finalize WAV file: {e}"))),
            None => Ok(()),
        }
    }

    fn write_field(&mut self, left: &[i16], right: &[i16]) -> std::result::Result<(), hound::Error> {
        if let Some(writer) = self.writer.as_mut() {
            for (&l, &r) in left.iter().zip(right) {
                writer.write_sample(l)?;
                writer.write_sample(r)?;
            }
            self.frames += left.len().min(right.len()) as u64;
        }
        Ok(())
    }
}

impl AudioOutput for WavRecorder {
    fn start(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Err(SyncError::AudioFileError("WAV file already finalized".into()));
        }
        self.recording = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.recording = false;
    }

    fn pause(&mut self) {
        self.recording = false;
    }

    fn resume(&mut self) {
        self.recording = true;
    }

    fn output(&mut self, left: &[i16], right: &[i16]) {
        if !self.recording || self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_field(left, right) {
            log::error!("wav: write failed, recording stopped: {e}");
            self.error = Some(format!("Failed to write sample: {e}"));
        }
    }

    fn buffered_count(&self) -> usize {
        0
    }
}

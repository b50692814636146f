//! Mega Drive / Genesis scanline scheduler and audio synchronization core
//!
//! Drives the main CPU in bounded slices against a per-scanline event timeline,
//! raising horizontal and vertical interrupts at the right cycle, throttling
//! DMA and the VDP write FIFO, and producing one field of mixed FM + PSG audio
//! per video field for a real-time output device.
//!
//! # Features
//! - Five-phase scanline event model with exact H-int cycle snapping
//! - DMA freeze with retroactive clock correction
//! - SN76489 PSG emulation (16.16 fixed point, configurable noise LFSR)
//! - FM + PSG mixing with high-pass DC blocker and variable low-pass biquad
//! - Per-field audio pacing with buffer-fill feedback for dynamic frame skip
//! - Lock-free single-producer / single-consumer stereo ring buffer
//!
//! # Crate feature flags
//! - `streaming` (opt-in): Real-time audio output via rodio (`AudioDevice`)
//! - `export-wav` (opt-in): Field-by-field WAV recording via hound (`WavRecorder`)
//!
//! # Collaborators
//! The CPU cores, the FM chip and the line renderer live outside this crate.
//! They plug in through the traits in [`bus`], borrowed for the duration of
//! each call through [`bus::Collaborators`].
//!
//! # Quick start
//! ```no_run
//! use genesis_sync::bus::{Collaborators, Detached};
//! use genesis_sync::streaming::NullOutput;
//! use genesis_sync::{CoreConfig, Session};
//!
//! # struct Cpu;
//! # impl genesis_sync::bus::MainCpu for Cpu {
//! #     fn execute(&mut self, budget: u32) -> u32 { budget }
//! #     fn step(&mut self) -> u32 { 4 }
//! #     fn raise_autovector(&mut self, _level: u8) {}
//! # }
//! let mut session = Session::new(CoreConfig::default()).unwrap();
//! let mut cpu = Cpu;
//! let (mut sub, mut fm, mut video) = (Detached, Detached, Detached);
//! let mut audio = NullOutput::default();
//! let mut hw = Collaborators {
//!     cpu: &mut cpu,
//!     sub_cpu: &mut sub,
//!     fm: &mut fm,
//!     renderer: &mut video,
//!     audio: &mut audio,
//! };
//! session.run_frame(&mut hw);
//! ```

#![warn(missing_docs)]

pub mod bus; // Collaborator traits (CPU, FM, renderer, audio)
pub mod config; // Core configuration and video register view
pub mod psg; // SN76489 emulation
pub mod scheduler; // Scanline event scheduler
pub mod session; // Top-level emulation session
pub mod sound; // Per-field mixing, filtering and pacing
pub mod streaming; // Ring buffer and audio outputs
pub mod timing; // Region timing and clock domain

/// Error types for the synchronization core
///
/// Timing faults are not represented here: a scheduler contract violation is
/// fatal and reported through [`fatal_contract_violation`].
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Audio file error (recording)
    #[error("Audio file error: {0}")]
    AudioFileError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Configuration (de)serialization error
    #[error("Configuration format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SyncError {
    /// Converts a String into `SyncError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `AudioDeviceError`, ...)
    /// where the failure has a clear category.
    fn from(msg: String) -> Self {
        SyncError::Other(msg)
    }
}

impl From<&str> for SyncError {
    /// Converts a string slice into `SyncError::Other`.
    fn from(msg: &str) -> Self {
        SyncError::Other(msg.to_string())
    }
}

/// Result type for synchronization core operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Report a broken timing contract and abort.
///
/// Used for states that can only be reached through a programming error in
/// the emulator (for example re-entering a DMA freeze). The diagnostic goes to
/// the log first so it survives in captured output.
#[cold]
#[inline(never)]
pub fn fatal_contract_violation(what: &str) -> ! {
    log::error!("timing contract violated: {what}");
    panic!("timing contract violated: {what}");
}

// Public API exports
pub use config::{CoreConfig, PsgConfig, SoundConfig, VideoFlags, VideoRegisters};
pub use psg::Sn76489;
pub use scheduler::{Phase, Scheduler};
pub use session::{FramePacer, Session, ShutdownFlag};
pub use sound::{Feedback, SoundMixer};
pub use streaming::{Consumer, NullOutput, Producer, RingBuffer, RingOutput, StereoFrame, StreamConfig};
pub use timing::{FrameTiming, Region};

#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;

#[cfg(feature = "export-wav")]
pub use streaming::WavRecorder;

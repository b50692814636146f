//! Core configuration
//!
//! Everything a session needs to know before it starts: region, audio rate
//! and filtering, PSG flavour, and streaming sizes. Loadable from JSON so a
//! front end can keep it in a settings file.

use crate::streaming::StreamConfig;
use crate::timing::{FrameTiming, Region};
use crate::{Result, SyncError};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Default output sample rate (44.1 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

bitflags! {
    /// Video control bits the scheduler reads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VideoFlags: u8 {
        /// Horizontal interrupt enable (register 0, bit 4)
        const HINT_ENABLE = 0x01;
        /// Vertical interrupt enable (register 1, bit 5)
        const VINT_ENABLE = 0x02;
        /// Display enable (register 1, bit 6)
        const DISPLAY_ENABLE = 0x04;
        /// DMA enable (register 1, bit 4)
        const DMA_ENABLE = 0x08;
        /// 40-cell horizontal mode (register 12, bit 0)
        const H40 = 0x10;
    }
}

/// Snapshot of the VDP register state that affects scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoRegisters {
    /// Control bits
    pub flags: VideoFlags,
    /// H-int line divisor (register 10)
    pub hint_divisor: u8,
}

impl VideoRegisters {
    /// Build from raw register bytes
    pub fn from_registers(reg0: u8, reg1: u8, reg10: u8, reg12: u8) -> Self {
        let mut flags = VideoFlags::empty();
        flags.set(VideoFlags::HINT_ENABLE, reg0 & 0x10 != 0);
        flags.set(VideoFlags::VINT_ENABLE, reg1 & 0x20 != 0);
        flags.set(VideoFlags::DISPLAY_ENABLE, reg1 & 0x40 != 0);
        flags.set(VideoFlags::DMA_ENABLE, reg1 & 0x10 != 0);
        flags.set(VideoFlags::H40, reg12 & 0x01 != 0);
        Self {
            flags,
            hint_divisor: reg10,
        }
    }

    /// H-int enabled
    #[inline]
    pub fn hint_enabled(&self) -> bool {
        self.flags.contains(VideoFlags::HINT_ENABLE)
    }

    /// V-int enabled
    #[inline]
    pub fn vint_enabled(&self) -> bool {
        self.flags.contains(VideoFlags::VINT_ENABLE)
    }

    /// Display enabled
    #[inline]
    pub fn display_enabled(&self) -> bool {
        self.flags.contains(VideoFlags::DISPLAY_ENABLE)
    }

    /// DMA enabled
    #[inline]
    pub fn dma_enabled(&self) -> bool {
        self.flags.contains(VideoFlags::DMA_ENABLE)
    }

    /// 40-cell mode
    #[inline]
    pub fn is_h40(&self) -> bool {
        self.flags.contains(VideoFlags::H40)
    }
}

/// Sound pipeline settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Master sound switch; when off, fields are still pushed but silent
    pub enabled: bool,
    /// Mix the PSG
    pub psg: bool,
    /// Mix the FM chip
    pub fm: bool,
    /// Output sample rate (Hz)
    pub sample_rate: u32,
    /// Low-pass strength in percent (0 = bypass, 100 = full)
    pub filter_percent: u8,
    /// Fields of audio to keep buffered before feedback turns non-negative
    pub min_fields: u32,
    /// Buffered fields above which the driver stops producing
    pub max_fields: u32,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            psg: true,
            fm: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
            filter_percent: 50,
            min_fields: 5,
            max_fields: 10,
        }
    }
}

/// PSG flavour settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsgConfig {
    /// Volume boost in steps of about 0.2 dB
    pub gain: u8,
    /// Feedback taps for white noise
    pub white_noise_taps: u16,
    /// Feedback taps for periodic noise
    pub periodic_noise_taps: u16,
    /// Shift register value after a noise control write
    pub shift_preset: u16,
}

impl Default for PsgConfig {
    fn default() -> Self {
        Self {
            gain: 0,
            white_noise_taps: 0x0009,
            periodic_noise_taps: 0x0001,
            shift_preset: 0x8000,
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Video region
    pub region: Region,
    /// Sound pipeline
    pub sound: SoundConfig,
    /// PSG flavour
    pub psg: PsgConfig,
    /// Ring buffer sizing
    pub stream: StreamConfig,
}

impl CoreConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        let sound = &self.sound;
        if sound.sample_rate == 0 {
            return Err(SyncError::ConfigError("sample rate must be non-zero".into()));
        }
        if sound.filter_percent > 100 {
            return Err(SyncError::ConfigError(format!(
                "filter strength {}% is out of range (0-100)",
                sound.filter_percent
            )));
        }
        if sound.min_fields == 0 {
            return Err(SyncError::ConfigError("min_fields must be at least 1".into()));
        }
        if sound.max_fields < sound.min_fields {
            return Err(SyncError::ConfigError(format!(
                "max_fields ({}) is below min_fields ({})",
                sound.max_fields, sound.min_fields
            )));
        }
        if self.psg.shift_preset == 0 {
            return Err(SyncError::ConfigError(
                "shift register preset must be non-zero".into(),
            ));
        }
        if self.stream.ring_buffer_size == 0 {
            return Err(SyncError::ConfigError(
                "ring buffer size must be greater than 0".into(),
            ));
        }

        // Pacing waits above twice the threshold or max_fields, whichever is lower
        let field = FrameTiming::for_region(self.region).samples_per_field(sound.sample_rate);
        let pacing_limit = field * (2 * sound.min_fields).min(sound.max_fields) as usize;
        if self.stream.ring_buffer_size <= pacing_limit {
            log::warn!(
                "ring buffer of {} frames never exceeds the pacing limit of {pacing_limit}; video will not be held back",
                self.stream.ring_buffer_size
            );
        }
        Ok(())
    }
}

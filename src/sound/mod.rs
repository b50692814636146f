//! Per-field sound mixing and pacing
//!
//! The mixer is driven by the scheduler: once per scanline it renders that
//! line's share of the field from the FM chip and the PSG, mixes and filters
//! it, and at the end of the field hands the whole field to the platform
//! audio interface. The buffer fill it reads back afterwards becomes the
//! feedback that paces the emulator.

pub mod field;
pub mod filter;
pub mod music_log;

pub use field::{line_window, FieldBuffer};
pub use filter::{BiquadCoefficients, DcBlocker, FilterState, LowPass};
pub use music_log::{MusicLog, MusicLogFormat, MusicLogSink, SharedMusicLog};

use crate::bus::{AudioOutput, FmChip};
use crate::config::{CoreConfig, SoundConfig};
use crate::psg::Sn76489;
use crate::timing::FrameTiming;
use log::{debug, info, trace, warn};

/// PSG output midpoint
const PSG_CENTER: i32 = 0x4000;

/// Buffer fill reported after each field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    /// Fewer than the target number of fields are queued
    NeedMore,
    /// Enough audio is queued
    #[default]
    Sufficient,
}

impl Feedback {
    /// -1 when more audio is needed, 0 otherwise
    pub fn value(self) -> i32 {
        match self {
            Feedback::NeedMore => -1,
            Feedback::Sufficient => 0,
        }
    }
}

#[inline]
fn saturate(sample: i32) -> i16 {
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Field mixer: PSG, FM pass-through, filters and pacing feedback
pub struct SoundMixer {
    config: SoundConfig,
    psg: Sn76489,
    filters: FilterState,
    field: FieldBuffer,
    fm_left: Vec<i16>,
    fm_right: Vec<i16>,
    psg_scratch: Vec<u16>,
    samples_per_field: usize,
    threshold: usize,
    total_lines: u32,
    feedback: Feedback,
    fm_address: [u8; 2],
    fm_registers: [[u8; 256]; 2],
    music_log: Option<MusicLog>,
    fields: u64,
}

impl SoundMixer {
    /// Create a mixer for `config` at the given region timing
    pub fn new(config: &CoreConfig, timing: &FrameTiming) -> Self {
        let sound = config.sound;
        let mut mixer = Self {
            config: sound,
            psg: Sn76489::new(timing.psg_clock, sound.sample_rate, config.psg),
            filters: FilterState::new(sound.filter_percent),
            field: FieldBuffer::default(),
            fm_left: Vec::new(),
            fm_right: Vec::new(),
            psg_scratch: Vec::new(),
            samples_per_field: 0,
            threshold: 0,
            total_lines: timing.total_lines,
            feedback: Feedback::Sufficient,
            fm_address: [0; 2],
            fm_registers: [[0; 256]; 2],
            music_log: None,
            fields: 0,
        };
        mixer.reconfigure(timing);
        mixer
    }

    /// Recompute per-field sizes after a region or rate change
    pub fn reconfigure(&mut self, timing: &FrameTiming) {
        self.samples_per_field = timing.samples_per_field(self.config.sample_rate);
        self.threshold = self.samples_per_field * self.config.min_fields as usize;
        self.total_lines = timing.total_lines;
        if let Some(log) = self.music_log.as_mut() {
            log.set_total_lines(timing.total_lines);
        }
        self.field.resize(self.samples_per_field);
        self.fm_left.resize(self.samples_per_field, 0);
        self.fm_right.resize(self.samples_per_field, 0);
        self.psg_scratch.resize(self.samples_per_field, 0);
        self.psg.set_clocks(timing.psg_clock, self.config.sample_rate);
        info!(
            "sound: {} Hz, {} samples per {} field, threshold {}",
            self.config.sample_rate, self.samples_per_field, timing.region, self.threshold
        );
    }

    /// Clear chip, filter and field state
    pub fn reset(&mut self) {
        self.psg.reset();
        self.filters.reset();
        self.field.silence();
        self.feedback = Feedback::Sufficient;
        self.fm_address = [0; 2];
        self.fm_registers = [[0; 256]; 2];
    }

    /// A new field begins
    pub fn on_field_start(&mut self) {
        trace!("sound: field {} start", self.fields);
        self.field.silence();
    }

    /// Render `line`'s share of the field
    pub fn on_scanline(&mut self, line: u32, total_lines: u32, fm: &mut dyn FmChip) {
        if let Some(log) = self.music_log.as_mut() {
            log.end_line();
        }
        let window = line_window(self.samples_per_field, line, total_lines);
        if window.is_empty() {
            return;
        }
        self.mix_and_filter(window, fm);
    }

    /// Render, mix and filter the field samples in `window`
    pub fn mix_and_filter(&mut self, window: std::ops::Range<usize>, fm: &mut dyn FmChip) {
        let n = window.len();
        let use_fm = self.config.fm;
        let use_psg = self.config.psg;

        if use_fm {
            fm.update(&mut self.fm_left[..n], &mut self.fm_right[..n]);
        }
        if use_psg {
            self.psg.update(&mut self.psg_scratch[..n]);
        }

        let (left, right) = self.field.window_mut(window);
        if !use_fm && !use_psg {
            left.fill(0);
            right.fill(0);
            return;
        }

        for i in 0..n {
            let (mut l, mut r) = (0i32, 0i32);
            if use_psg {
                let sn = (self.psg_scratch[i] as i32 - PSG_CENTER) * 3 / 8;
                l += sn;
                r += sn;
            }
            if use_fm {
                l += (self.fm_left[i] as i32 * 7) >> 3;
                r += (self.fm_right[i] as i32 * 7) >> 3;
            }
            let (l, r) = self.filters.process(l, r);
            left[i] = saturate(l);
            right[i] = saturate(r);
        }
    }

    /// Push the finished field to `audio` and update the feedback
    pub fn on_field_end(&mut self, audio: &mut dyn AudioOutput) -> Feedback {
        if let Some(log) = self.music_log.as_mut() {
            log.end_field();
        }
        self.fields += 1;

        if !self.config.enabled {
            self.field.silence();
            audio.output(self.field.left(), self.field.right());
            self.feedback = Feedback::Sufficient;
            return self.feedback;
        }

        // Decided on what was queued before this field
        let buffered = audio.buffered_count();
        self.feedback = if buffered < self.threshold {
            Feedback::NeedMore
        } else {
            Feedback::Sufficient
        };
        debug!(
            "sound: field end, {buffered} buffered / {} threshold, feedback {}",
            self.threshold,
            self.feedback.value()
        );
        audio.output(self.field.left(), self.field.right());
        self.feedback
    }

    /// Write to FM port 0-3, shadowing the registers
    pub fn fm_write(&mut self, port: u8, data: u8, fm: &mut dyn FmChip) {
        let port = port & 0x03;
        let bank = (port >> 1) as usize;
        if port & 1 == 0 {
            self.fm_address[bank] = data;
        } else {
            let address = self.fm_address[bank];
            self.fm_registers[bank][address as usize] = data;
            if let Some(log) = self.music_log.as_mut() {
                log.fm(bank as u8, address, data);
            }
        }
        fm.write(port, data);
    }

    /// Read FM status
    pub fn fm_read(&mut self, addr: u8, fm: &mut dyn FmChip) -> u8 {
        fm.read(addr)
    }

    /// Write a byte to the PSG
    pub fn psg_write(&mut self, data: u8) {
        if let Some(log) = self.music_log.as_mut() {
            log.psg(data);
        }
        self.psg.write(data);
    }

    /// Start logging register writes to `sink` in `format`
    pub fn start_music_log(&mut self, sink: Box<dyn MusicLogSink>, format: MusicLogFormat) {
        info!("sound: {format:?} music log started");
        self.music_log = Some(MusicLog::new(sink, format, self.total_lines));
    }

    /// Stop logging; returns the number of fields logged
    pub fn stop_music_log(&mut self) -> Option<u64> {
        self.music_log.take().map(|log| {
            info!("sound: music log stopped after {} fields", log.fields());
            log.fields()
        })
    }

    /// Change filter strength (0-100 %)
    pub fn set_filter_percent(&mut self, percent: u8) {
        if percent > 100 {
            warn!("sound: filter strength {percent}% clamped to 100%");
        }
        self.config.filter_percent = percent.min(100);
        self.filters.set_strength(self.config.filter_percent);
    }

    /// Enable or disable the individual sources
    pub fn set_sources(&mut self, psg: bool, fm: bool) {
        self.config.psg = psg;
        self.config.fm = fm;
    }

    /// Master sound switch
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Feedback from the last field
    pub fn feedback(&self) -> Feedback {
        self.feedback
    }

    /// Buffered frames below which feedback asks for more
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Buffered frames at which the emulator should stop producing
    pub fn max_buffered(&self) -> usize {
        self.samples_per_field * self.config.max_fields as usize
    }

    /// Frames per field
    pub fn samples_per_field(&self) -> usize {
        self.samples_per_field
    }

    /// Output rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Active settings
    pub fn config(&self) -> &SoundConfig {
        &self.config
    }

    /// Current field buffer
    pub fn field(&self) -> &FieldBuffer {
        &self.field
    }

    /// Shadow of FM register `address` on `bank`
    pub fn fm_register(&self, bank: usize, address: u8) -> u8 {
        self.fm_registers[bank & 1][address as usize]
    }

    /// The PSG
    pub fn psg(&self) -> &Sn76489 {
        &self.psg
    }

    /// Fields completed
    pub fn fields(&self) -> u64 {
        self.fields
    }
}

impl std::fmt::Debug for SoundMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundMixer")
            .field("config", &self.config)
            .field("samples_per_field", &self.samples_per_field)
            .field("threshold", &self.threshold)
            .field("feedback", &self.feedback)
            .finish_non_exhaustive()
    }
}

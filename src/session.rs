//! Emulation session
//!
//! One [`Session`] owns all the timing and sound state of an emulated
//! machine. Nothing is global, so several sessions can run side by side.
//! Hardware outside the core is lent in per call through
//! [`Collaborators`].

use crate::bus::{AudioOutput, Collaborators, FmChip};
use crate::config::{CoreConfig, VideoRegisters};
use crate::scheduler::Scheduler;
use crate::sound::{Feedback, SoundMixer};
use crate::timing::{FrameTiming, Region};
use crate::Result;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request, checked at field boundaries
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// New, not requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the driving loop to stop
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Withdraw the request
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Video frame pacing from audio buffer fill
///
/// Audio is never skipped. When the device has more than twice the target
/// latency queued, or more than the configured maximum number of fields, the
/// driver holds back on new fields; when the mixer keeps
/// asking for more, fields accumulate in the skip counter so the front end
/// can drop rendering on the catch-up fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePacer {
    threshold: usize,
    max_buffered: usize,
    skip_counter: u32,
    frame_skip: u32,
}

impl FramePacer {
    /// Pacer for a feedback threshold of `threshold` frames and a cap of
    /// `max_buffered` queued frames
    pub fn new(threshold: usize, max_buffered: usize) -> Self {
        Self {
            threshold,
            max_buffered,
            skip_counter: 0,
            frame_skip: 0,
        }
    }

    /// Update after a field size change
    pub fn set_limits(&mut self, threshold: usize, max_buffered: usize) {
        self.threshold = threshold;
        self.max_buffered = max_buffered;
    }

    /// Queued frames above which the driver waits
    pub fn wait_limit(&self) -> usize {
        (self.threshold * 2).min(self.max_buffered)
    }

    /// Whether to hold off emulating the next field
    pub fn should_wait(&self, buffered: usize) -> bool {
        buffered > self.wait_limit()
    }

    /// Feed the mixer's feedback after a field
    pub fn record_field(&mut self, feedback: Feedback) {
        self.skip_counter += 1;
        if feedback.value() >= 0 {
            self.frame_skip = self.skip_counter;
            self.skip_counter = 0;
        }
    }

    /// Fields the last catch-up run spanned (1 means no skipping)
    pub fn frame_skip(&self) -> u32 {
        self.frame_skip
    }

    /// Whether the current field may go unrendered
    pub fn behind(&self) -> bool {
        self.skip_counter > 0
    }

    /// Forget the skip history
    pub fn reset(&mut self) {
        self.skip_counter = 0;
        self.frame_skip = 0;
    }
}

/// Top-level emulation context
#[derive(Debug)]
pub struct Session {
    config: CoreConfig,
    scheduler: Scheduler,
    sound: SoundMixer,
    pacer: FramePacer,
    shutdown: ShutdownFlag,
}

impl Session {
    /// Create a session at hard-reset state
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let timing = FrameTiming::for_region(config.region);
        let sound = SoundMixer::new(&config, &timing);
        let pacer = FramePacer::new(sound.threshold(), sound.max_buffered());
        Ok(Self {
            config,
            scheduler: Scheduler::new(timing, VideoRegisters::default()),
            sound,
            pacer,
            shutdown: ShutdownFlag::new(),
        })
    }

    /// Hard reset: timing, PSG, filters and pacing back to power-on
    pub fn hard_reset(&mut self) {
        info!("session: hard reset ({})", self.config.region);
        self.scheduler.reset();
        self.sound.reset();
        self.pacer.reset();
    }

    /// Soft reset: only the FM chip; timing and sound state are kept
    pub fn soft_reset(&mut self, fm: &mut dyn FmChip) {
        info!("session: soft reset");
        fm.reset();
    }

    /// Switch region and hard reset
    pub fn set_region(&mut self, region: Region) {
        self.config.region = region;
        let timing = FrameTiming::for_region(region);
        self.scheduler.set_timing(timing);
        self.sound.reconfigure(&timing);
        self.pacer
            .set_limits(self.sound.threshold(), self.sound.max_buffered());
        self.hard_reset();
    }

    /// Latch video register state
    pub fn set_video(&mut self, video: VideoRegisters) {
        self.scheduler.set_video(video);
    }

    /// Run one field and feed the pacer
    pub fn run_frame(&mut self, hw: &mut Collaborators<'_>) -> Feedback {
        self.scheduler.run_frame(&mut self.sound, hw);
        let feedback = self.sound.feedback();
        self.pacer.record_field(feedback);
        feedback
    }

    /// Run up to `count` fields, stopping early on shutdown
    ///
    /// # Returns
    ///
    /// Fields actually run
    pub fn run_frames(&mut self, count: u64, hw: &mut Collaborators<'_>) -> u64 {
        let mut run = 0;
        while run < count && !self.shutdown.is_requested() {
            self.run_frame(hw);
            run += 1;
        }
        run
    }

    /// Whether the driver should hold off the next field
    pub fn should_wait(&self, audio: &dyn AudioOutput) -> bool {
        self.pacer.should_wait(audio.buffered_count())
    }

    /// Run the CPU up to `budget` clocks or the next event
    pub fn run_until_next_event(&mut self, budget: u32, hw: &mut Collaborators<'_>) -> u64 {
        self.scheduler.run_until_next_event(budget, &mut self.sound, hw)
    }

    /// Single-step the CPU
    pub fn step(&mut self, hw: &mut Collaborators<'_>) -> u32 {
        self.scheduler.run_one_cpu_step(&mut self.sound, hw)
    }

    /// Stall the CPU for a DMA of `bytes`
    pub fn freeze_for_bytes(&mut self, bytes: u32, hw: &mut Collaborators<'_>) {
        self.scheduler.freeze_for_bytes(bytes, &mut self.sound, hw);
    }

    /// Stall the CPU for `clocks`
    pub fn freeze_for_clocks(&mut self, clocks: u64, hw: &mut Collaborators<'_>) {
        self.scheduler.freeze_for_clocks(clocks, &mut self.sound, hw);
    }

    /// Record clocks executed inside an unfinished CPU block
    pub fn tick_in_block(&mut self, clocks: u32) {
        self.scheduler.tick_in_block(clocks);
    }

    /// Settle a finished CPU block
    pub fn complete_block(&mut self, clocks: u32, hw: &mut Collaborators<'_>) {
        self.scheduler.complete_block(clocks, &mut self.sound, hw);
    }

    /// Queue a DMA
    pub fn start_dma(&mut self, bytes: u32) {
        self.scheduler.start_dma(bytes);
    }

    /// PSG write
    pub fn psg_write(&mut self, data: u8) {
        self.sound.psg_write(data);
    }

    /// FM write on port 0-3
    pub fn fm_write(&mut self, port: u8, data: u8, fm: &mut dyn FmChip) {
        self.sound.fm_write(port, data, fm);
    }

    /// FM status read
    pub fn fm_read(&mut self, addr: u8, fm: &mut dyn FmChip) -> u8 {
        self.sound.fm_read(addr, fm)
    }

    /// Shutdown flag to hand to another thread
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Configuration in effect
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The scheduler, mutably
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The sound mixer
    pub fn sound(&self) -> &SoundMixer {
        &self.sound
    }

    /// The sound mixer, mutably
    pub fn sound_mut(&mut self) -> &mut SoundMixer {
        &mut self.sound
    }

    /// Frame pacing state
    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }
}

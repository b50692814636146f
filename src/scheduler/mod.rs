//! Scanline event scheduler
//!
//! Runs the main CPU in slices bounded by the next scanline event and
//! performs the video chip's per-line work when each event falls due:
//!
//! | phase | deadline | work |
//! |---|---|---|
//! | 0 `LineStart` | line start | field start, vblank clear, H counter reload |
//! | 1 `VintCheck` | V-int point | vblank/vsync and the level 6 interrupt |
//! | 2 `HintProcess` | H-int point | H counter, level 4 interrupt, clock snap, DMA |
//! | 3 `HDisplay` | display point | render the line |
//! | 4 `LineEnd` | line end | FIFO drain, sound, line advance, field end |
//!
//! `LineEnd` runs the line-start bookkeeping inline and resumes at
//! `VintCheck`, so phase 0 is only ever pending once after a hard reset.

pub mod dma;
pub mod fifo;
pub mod phase;

pub use dma::{bytes_per_line, DmaThrottle};
pub use fifo::{WriteFifo, FIFO_DEPTH};
pub use phase::{Deadlines, Phase};

use crate::bus::{Collaborators, HINT_LEVEL, VINT_LEVEL};
use crate::config::VideoRegisters;
use crate::sound::SoundMixer;
use crate::timing::{ClockDomain, FrameTiming};
use log::{debug, trace};

/// Clocks the CPU ran past the scheduler's bookkeeping, set aside while a
/// freeze drives events and handed back afterwards
///
/// The CPU may have executed part of a block (moving the clock) before
/// asking for a freeze. The block's own settlement still has to charge those
/// clocks later, so they are removed from the event budget for the duration
/// of the freeze and restored when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use = "a pending correction must be finished"]
pub struct PendingCorrection {
    missed: i64,
}

impl PendingCorrection {
    /// Clocks set aside
    pub fn missed(&self) -> i64 {
        self.missed
    }
}

/// Scanline/field event scheduler
#[derive(Debug, Clone)]
pub struct Scheduler {
    timing: FrameTiming,
    video: VideoRegisters,
    clock: ClockDomain,
    line: u32,
    phase: Phase,
    deadlines: Deadlines,
    hint_countdown: i32,
    dma: DmaThrottle,
    fifo: WriteFifo,
    vblank: bool,
    hblank: bool,
    vsync: bool,
    odd_field: bool,
    frozen: bool,
    held_interrupt: Option<u8>,
    in_freeze: bool,
    frames: u64,
}

impl Scheduler {
    /// Scheduler at hard-reset state
    pub fn new(timing: FrameTiming, video: VideoRegisters) -> Self {
        let mut scheduler = Self {
            timing,
            video,
            clock: ClockDomain::new(),
            line: 0,
            phase: Phase::LineStart,
            deadlines: Deadlines::default(),
            hint_countdown: 0,
            dma: DmaThrottle::new(),
            fifo: WriteFifo::new(),
            vblank: false,
            hblank: false,
            vsync: false,
            odd_field: false,
            frozen: false,
            held_interrupt: None,
            in_freeze: false,
            frames: 0,
        };
        scheduler.reset();
        scheduler
    }

    /// Hard reset: clock, line, phase and every flag back to power-on
    pub fn reset(&mut self) {
        self.clock.reset();
        self.line = 0;
        self.phase = Phase::LineStart;
        self.deadlines = Deadlines::at(0, &self.timing.line_offsets());
        self.hint_countdown = self.video.hint_divisor as i32;
        self.dma.reset();
        self.fifo.clear();
        self.vblank = false;
        self.hblank = false;
        self.vsync = false;
        self.odd_field = false;
        self.frozen = false;
        self.held_interrupt = None;
        self.in_freeze = false;
        self.frames = 0;
        self.clock.arm(self.deadlines.for_phase(self.phase));
    }

    /// Switch region timing; implies a hard reset
    pub fn set_timing(&mut self, timing: FrameTiming) {
        self.timing = timing;
        self.reset();
    }

    /// Latch new video register state
    pub fn set_video(&mut self, video: VideoRegisters) {
        self.video = video;
    }

    /// Perform the pending phase's work and arm the next deadline
    pub fn advance_one_event(&mut self, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        trace!(
            "phase {} line {} clock {} deadline {} hcount {}",
            self.phase.index(),
            self.line,
            self.clock.now(),
            self.deadlines.for_phase(self.phase),
            self.hint_countdown
        );

        match self.phase {
            Phase::LineStart => self.line_start(sound),
            Phase::VintCheck => self.vint_check(hw),
            Phase::HintProcess => self.hint_process(hw),
            Phase::HDisplay => self.hdisplay(hw),
            Phase::LineEnd => {
                self.line_end(sound, hw);
                self.line_start(sound);
            }
        }

        self.phase = self.phase.next();
        self.clock.arm(self.deadlines.for_phase(self.phase));
    }

    fn line_start(&mut self, sound: &mut SoundMixer) {
        if self.line == 0 {
            sound.on_field_start();
        }
        if self.line == self.timing.pre_visible_line() {
            self.vblank = false;
            self.hint_countdown = self.video.hint_divisor as i32;
        }
    }

    fn vint_check(&mut self, hw: &mut Collaborators<'_>) {
        if self.line == self.timing.visible_end {
            self.vblank = true;
            self.vsync = true;
            if self.video.vint_enabled() {
                self.raise_interrupt(VINT_LEVEL, hw);
            }
        }
    }

    /// A frozen CPU cannot take interrupts; the highest level waits
    fn raise_interrupt(&mut self, level: u8, hw: &mut Collaborators<'_>) {
        if self.frozen {
            debug!("interrupt level {level} held during DMA freeze");
            self.held_interrupt = self.held_interrupt.max(Some(level));
        } else {
            hw.cpu.raise_autovector(level);
        }
    }

    fn hint_process(&mut self, hw: &mut Collaborators<'_>) {
        let line = self.line;
        if self.timing.is_visible(line) {
            self.hblank = true;
        }
        if line == self.timing.pre_visible_line() || line > self.timing.visible_end {
            debug!("hint counter reload at line {line}");
            self.hint_countdown = self.video.hint_divisor as i32;
        }

        if self.video.hint_enabled() {
            let expired = self.hint_countdown == 0;
            self.hint_countdown -= 1;
            if expired {
                self.hint_countdown = self.video.hint_divisor as i32;
                let (line, start, end) = (
                    line as i64,
                    self.timing.visible_start as i64,
                    self.timing.visible_end as i64,
                );
                if line >= start - 1 && line < end - 1 {
                    self.raise_interrupt(HINT_LEVEL, hw);
                }
                // Code after an H-int expects a fixed cycle position
                self.clock.snap_to(self.deadlines.hint);
            }
        }

        let moved = self.dma.throttle(self.blanked(), self.video.is_h40());
        if moved > 0 {
            trace!("dma: {moved} bytes on line {line}, {} left", self.dma.remaining());
        }
    }

    fn hdisplay(&mut self, hw: &mut Collaborators<'_>) {
        if self.timing.is_visible(self.line) {
            hw.renderer.render_line(self.line - self.timing.visible_start);
        }
    }

    fn line_end(&mut self, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        let total = self.timing.total_lines;
        let visible = self.timing.is_visible(self.line);
        if visible {
            self.hblank = false;
        }

        if self.blanked() {
            self.fifo.drain(2);
        } else if visible && self.line & 1 == 0 {
            self.fifo.drain(1);
        }

        sound.on_scanline(self.line, total, hw.fm);

        self.line += 1;
        if self.line == self.timing.visible_end {
            hw.sub_cpu.notify_field_boundary_interrupt();
        }
        if self.line == total {
            // Sound finishes the field before the picture is presented
            sound.on_field_end(hw.audio);
            hw.renderer.end_of_field();
            self.end_field();
            hw.sub_cpu.reset_field_state();
            self.frames += 1;
        }

        self.deadlines.advance(self.timing.clocks_per_line as u64);
    }

    fn end_field(&mut self) {
        self.line = 0;
        self.odd_field = !self.odd_field;
        debug!("field {} complete", self.frames);
    }

    fn catch_up(&mut self, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        while self.clock.remaining() <= 0 {
            self.advance_one_event(sound, hw);
        }
    }

    /// Run the CPU for up to `budget` clocks, stopping at the next event,
    /// then process every event that is due
    ///
    /// # Returns
    ///
    /// Clocks the CPU consumed
    pub fn run_until_next_event(
        &mut self,
        budget: u32,
        sound: &mut SoundMixer,
        hw: &mut Collaborators<'_>,
    ) -> u64 {
        let mut consumed: u64 = 0;
        while self.clock.remaining() > 0 && consumed < budget as u64 {
            let slice = self.clock.remaining().min((budget as u64 - consumed) as i64) as u32;
            // An idle CPU sits out the whole slice
            let ran = match hw.cpu.execute(slice) {
                0 => slice,
                n => n,
            };
            self.clock.consume(ran as u64);
            consumed += ran as u64;
        }
        self.catch_up(sound, hw);
        consumed
    }

    /// Execute one CPU instruction, then process every event that is due
    pub fn run_one_cpu_step(&mut self, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) -> u32 {
        let ran = hw.cpu.step();
        self.clock.consume(ran as u64);
        self.catch_up(sound, hw);
        ran
    }

    /// Run until the frame counter changes
    pub fn run_frame(&mut self, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        let start = self.frames;
        while self.frames == start {
            self.run_until_next_event(u32::MAX, sound, hw);
        }
    }

    /// Record clocks executed inside a CPU block that has not completed yet
    pub fn tick_in_block(&mut self, clocks: u32) {
        self.clock.tick(clocks as u64);
    }

    /// Settle a completed CPU block of `clocks` and process due events
    pub fn complete_block(&mut self, clocks: u32, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        self.clock.settle(clocks as u64);
        self.catch_up(sound, hw);
    }

    /// Bring the event budget up to date with the clock
    pub fn begin_correction(&mut self) -> PendingCorrection {
        let deadline = self.deadlines.for_phase(self.phase);
        let missed = self.clock.remaining() - self.clock.until(deadline);
        self.clock.adjust_remaining(-missed);
        PendingCorrection { missed }
    }

    /// Hand back the clocks set aside by [`begin_correction`](Self::begin_correction)
    pub fn finish_correction(&mut self, correction: PendingCorrection) {
        self.clock.adjust_remaining(correction.missed);
    }

    /// Stall the CPU for `clocks`, processing every event that falls inside
    ///
    /// Safe to call in the middle of a CPU block.
    pub fn freeze_for_clocks(&mut self, clocks: u64, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        if self.in_freeze {
            crate::fatal_contract_violation("freeze_for_clocks re-entered");
        }
        self.in_freeze = true;

        let correction = self.begin_correction();
        self.clock.consume(clocks);
        self.catch_up(sound, hw);
        self.finish_correction(correction);

        self.in_freeze = false;
    }

    /// Stall the CPU for as long as a DMA of `bytes` takes
    ///
    /// The transfer proceeds line by line at the rate of each line's mode, so
    /// a stall that crosses into vblank speeds up. Interrupts raised during
    /// the stall are held and the highest one is delivered when it ends.
    pub fn freeze_for_bytes(&mut self, bytes: u32, sound: &mut SoundMixer, hw: &mut Collaborators<'_>) {
        let mut left = bytes as u64;
        let clocks_per_line = self.timing.clocks_per_line as u64;
        self.frozen = true;

        while left > 0 {
            let clocks_left = self.clock.until(self.deadlines.line_end).max(0) as u64;
            let rate = bytes_per_line(self.blanked(), self.video.is_h40()) as u64;
            let transferable = clocks_left * rate / clocks_per_line;

            if transferable == 0 {
                // Not even one byte fits; let the line run out
                self.freeze_for_clocks(clocks_left, sound, hw);
            } else if left >= transferable {
                self.freeze_for_clocks(clocks_left, sound, hw);
                left -= transferable;
            } else {
                self.freeze_for_clocks(left * clocks_left / transferable, sound, hw);
                left = 0;
            }
        }

        self.frozen = false;
        if let Some(level) = self.held_interrupt.take() {
            hw.cpu.raise_autovector(level);
        }
    }

    /// Queue a DMA of `bytes`; ignored while DMA is disabled
    pub fn start_dma(&mut self, bytes: u32) {
        if !self.video.dma_enabled() {
            debug!("dma: request for {bytes} bytes ignored, DMA disabled");
            return;
        }
        self.dma.start(bytes);
    }

    /// Queue one VDP write; `false` when the FIFO is full
    pub fn push_fifo(&mut self) -> bool {
        self.fifo.push()
    }

    /// vblank or display disabled
    #[inline]
    pub fn blanked(&self) -> bool {
        self.vblank || !self.video.display_enabled()
    }

    /// Read and clear the vsync flag
    pub fn take_vsync(&mut self) -> bool {
        std::mem::take(&mut self.vsync)
    }

    /// Current scanline
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Pending phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fields completed since reset
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// CPU clock
    pub fn clock(&self) -> u64 {
        self.clock.now()
    }

    /// Clocks until the pending event
    pub fn remaining(&self) -> i64 {
        self.clock.remaining()
    }

    /// Current line's deadlines
    pub fn deadlines(&self) -> &Deadlines {
        &self.deadlines
    }

    /// H-int countdown
    pub fn hint_countdown(&self) -> i32 {
        self.hint_countdown
    }

    /// Vertical blank
    pub fn vblank(&self) -> bool {
        self.vblank
    }

    /// Horizontal blank
    pub fn hblank(&self) -> bool {
        self.hblank
    }

    /// Odd field of an interlaced pair
    pub fn odd_field(&self) -> bool {
        self.odd_field
    }

    /// A DMA freeze is in progress
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// DMA state
    pub fn dma(&self) -> &DmaThrottle {
        &self.dma
    }

    /// FIFO state
    pub fn fifo(&self) -> &WriteFifo {
        &self.fifo
    }

    /// Region timing
    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    /// Video register state
    pub fn video(&self) -> &VideoRegisters {
        &self.video
    }
}

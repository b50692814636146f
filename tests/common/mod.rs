//! Recording collaborators shared by the integration tests

#![allow(dead_code)]

use genesis_sync::bus::{AudioOutput, Collaborators, FmChip, LineRenderer, MainCpu, SubCpu};
use genesis_sync::config::{CoreConfig, VideoFlags, VideoRegisters};
use genesis_sync::scheduler::Scheduler;
use genesis_sync::sound::SoundMixer;
use genesis_sync::timing::FrameTiming;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared call log for ordering checks
pub type CallLog = Rc<RefCell<Vec<&'static str>>>;

/// CPU that always uses its whole budget, plus a fixed overshoot
#[derive(Default)]
pub struct RecordingCpu {
    pub overshoot: u32,
    pub slices: Vec<u32>,
    pub levels: Vec<u8>,
    pub steps: u32,
}

impl RecordingCpu {
    pub fn interrupts(&self, level: u8) -> usize {
        self.levels.iter().filter(|&&l| l == level).count()
    }
}

impl MainCpu for RecordingCpu {
    fn execute(&mut self, budget: u32) -> u32 {
        self.slices.push(budget);
        budget + self.overshoot
    }

    fn step(&mut self) -> u32 {
        self.steps += 1;
        4
    }

    fn raise_autovector(&mut self, level: u8) {
        self.levels.push(level);
    }
}

#[derive(Default)]
pub struct RecordingSubCpu {
    pub log: CallLog,
    pub boundaries: u32,
    pub resets: u32,
}

impl SubCpu for RecordingSubCpu {
    fn notify_field_boundary_interrupt(&mut self) {
        self.boundaries += 1;
        self.log.borrow_mut().push("sub_cpu.boundary");
    }

    fn reset_field_state(&mut self) {
        self.resets += 1;
        self.log.borrow_mut().push("sub_cpu.reset");
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub log: CallLog,
    pub rows: Vec<u32>,
    pub fields: u32,
}

impl LineRenderer for RecordingRenderer {
    fn render_line(&mut self, row: u32) {
        self.rows.push(row);
    }

    fn end_of_field(&mut self) {
        self.fields += 1;
        self.log.borrow_mut().push("renderer.end_of_field");
    }
}

/// FM chip producing a square wave of `period` samples
pub struct SquareFm {
    pub amplitude: i16,
    pub period: usize,
    pub phase: usize,
    pub writes: Vec<(u8, u8)>,
}

impl SquareFm {
    pub fn new(amplitude: i16, period: usize) -> Self {
        Self {
            amplitude,
            period,
            phase: 0,
            writes: Vec::new(),
        }
    }

    pub fn next_sample(&mut self) -> i16 {
        let high = self.phase < self.period / 2;
        self.phase = (self.phase + 1) % self.period;
        if high {
            self.amplitude
        } else {
            -self.amplitude
        }
    }
}

impl FmChip for SquareFm {
    fn update(&mut self, left: &mut [i16], right: &mut [i16]) {
        for i in 0..left.len() {
            let s = self.next_sample();
            left[i] = s;
            right[i] = s;
        }
    }

    fn write(&mut self, port: u8, data: u8) {
        self.writes.push((port, data));
    }

    fn read(&mut self, _addr: u8) -> u8 {
        0
    }
}

/// Audio sink that keeps every field and reports a fixed fill level
#[derive(Default)]
pub struct RecordingAudio {
    pub log: CallLog,
    pub fields: Vec<(Vec<i16>, Vec<i16>)>,
    pub buffered: usize,
}

impl AudioOutput for RecordingAudio {
    fn start(&mut self) -> genesis_sync::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn output(&mut self, left: &[i16], right: &[i16]) {
        self.fields.push((left.to_vec(), right.to_vec()));
        self.log.borrow_mut().push("audio.output");
    }

    fn buffered_count(&self) -> usize {
        self.buffered
    }
}

/// Scheduler, mixer and recording hardware wired together
pub struct Rig {
    pub cpu: RecordingCpu,
    pub sub_cpu: RecordingSubCpu,
    pub fm: SquareFm,
    pub renderer: RecordingRenderer,
    pub audio: RecordingAudio,
    pub sound: SoundMixer,
    pub scheduler: Scheduler,
    pub log: CallLog,
}

impl Rig {
    pub fn ntsc(flags: VideoFlags, hint_divisor: u8) -> Self {
        Self::with_config(CoreConfig::default(), flags, hint_divisor)
    }

    pub fn with_config(config: CoreConfig, flags: VideoFlags, hint_divisor: u8) -> Self {
        // RUST_LOG=genesis_sync=trace shows the per-phase timeline
        let _ = env_logger::builder().is_test(true).try_init();
        let timing = FrameTiming::for_region(config.region);
        let log = CallLog::default();
        Self {
            cpu: RecordingCpu::default(),
            sub_cpu: RecordingSubCpu {
                log: Rc::clone(&log),
                ..Default::default()
            },
            fm: SquareFm::new(4000, 16),
            renderer: RecordingRenderer {
                log: Rc::clone(&log),
                ..Default::default()
            },
            audio: RecordingAudio {
                log: Rc::clone(&log),
                ..Default::default()
            },
            sound: SoundMixer::new(&config, &timing),
            scheduler: Scheduler::new(
                timing,
                VideoRegisters {
                    flags,
                    hint_divisor,
                },
            ),
            log,
        }
    }

    /// Run `f` with the scheduler, mixer and a borrowed collaborator set
    pub fn with<R>(&mut self, f: impl FnOnce(&mut Scheduler, &mut SoundMixer, &mut Collaborators<'_>) -> R) -> R {
        let mut hw = Collaborators {
            cpu: &mut self.cpu,
            sub_cpu: &mut self.sub_cpu,
            fm: &mut self.fm,
            renderer: &mut self.renderer,
            audio: &mut self.audio,
        };
        f(&mut self.scheduler, &mut self.sound, &mut hw)
    }

    pub fn run_frame(&mut self) {
        self.with(|s, snd, hw| s.run_frame(snd, hw));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.borrow().clone()
    }
}

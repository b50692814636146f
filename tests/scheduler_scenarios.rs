//! Whole-field scheduler scenarios against recording collaborators

mod common;

use common::Rig;
use genesis_sync::bus::{HINT_LEVEL, VINT_LEVEL};
use genesis_sync::config::{CoreConfig, VideoFlags, VideoRegisters};
use genesis_sync::scheduler::Phase;
use genesis_sync::sound::Feedback;
use genesis_sync::timing::Region;

fn display() -> VideoFlags {
    VideoFlags::DISPLAY_ENABLE | VideoFlags::H40
}

fn run_to_line(rig: &mut Rig, line: u32) {
    rig.with(|s, snd, hw| {
        while s.line() != line {
            s.run_until_next_event(u32::MAX, snd, hw);
        }
    });
}

#[test]
fn phase_sequence_skips_line_start_after_first_line() {
    let mut rig = Rig::ntsc(display(), 0);
    let mut phases = vec![rig.scheduler.phase()];
    for _ in 0..8 {
        rig.with(|s, snd, hw| s.advance_one_event(snd, hw));
        phases.push(rig.scheduler.phase());
    }
    assert_eq!(
        phases,
        vec![
            Phase::LineStart,
            Phase::VintCheck,
            Phase::HintProcess,
            Phase::HDisplay,
            Phase::LineEnd,
            Phase::VintCheck,
            Phase::HintProcess,
            Phase::HDisplay,
            Phase::LineEnd,
        ]
    );
    assert_eq!(rig.scheduler.line(), 1);
    assert_eq!(rig.scheduler.deadlines().line_start, 487);
}

#[test]
fn field_wraps_after_every_line() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.run_frame();
    assert_eq!(rig.scheduler.frames(), 1);
    assert_eq!(rig.scheduler.line(), 0);
    assert_eq!(rig.scheduler.clock(), 262 * 487);

    rig.run_frame();
    assert_eq!(rig.scheduler.frames(), 2);
    assert_eq!(rig.scheduler.clock(), 2 * 262 * 487);
    assert!(!rig.scheduler.odd_field());
}

#[test]
fn pal_field_length() {
    let config = CoreConfig {
        region: Region::Pal,
        ..Default::default()
    };
    let mut rig = Rig::with_config(config, display(), 0);
    rig.run_frame();
    assert_eq!(rig.scheduler.clock(), 313 * 485);
    assert_eq!(rig.renderer.rows.len(), 240);
    assert_eq!(rig.audio.fields[0].0.len(), 882);
}

#[test]
fn hint_every_tenth_line_with_divisor_nine() {
    let mut rig = Rig::ntsc(display() | VideoFlags::HINT_ENABLE | VideoFlags::VINT_ENABLE, 9);
    rig.run_frame();
    assert_eq!(rig.cpu.interrupts(HINT_LEVEL), 22);
    assert_eq!(rig.cpu.interrupts(VINT_LEVEL), 1);

    // The reload on the pre-visible line shifts later fields by one line
    rig.run_frame();
    rig.run_frame();
    assert_eq!(rig.cpu.interrupts(HINT_LEVEL), 66);
    assert_eq!(rig.cpu.interrupts(VINT_LEVEL), 3);
}

#[test]
fn hint_every_line_with_divisor_zero() {
    let mut rig = Rig::ntsc(display() | VideoFlags::HINT_ENABLE, 0);
    rig.run_frame();
    // Lines 0 to 222; the counter still expires in blank but stays quiet
    assert_eq!(rig.cpu.interrupts(HINT_LEVEL), 223);
    assert_eq!(rig.cpu.interrupts(VINT_LEVEL), 0);
}

#[test]
fn vint_follows_the_vsync_flag() {
    let mut rig = Rig::ntsc(display() | VideoFlags::VINT_ENABLE, 0);
    run_to_line(&mut rig, 224);
    assert_eq!(rig.cpu.interrupts(VINT_LEVEL), 0);
    assert!(!rig.scheduler.vblank());

    run_to_line(&mut rig, 225);
    assert_eq!(rig.cpu.interrupts(VINT_LEVEL), 1);
    assert!(rig.scheduler.vblank());
    assert!(rig.scheduler.take_vsync());

    // vblank clears on the pre-visible line
    run_to_line(&mut rig, 0);
    assert!(!rig.scheduler.vblank());
}

#[test]
fn renderer_sees_each_visible_row_once() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.run_frame();
    assert_eq!(rig.renderer.rows, (0..224).collect::<Vec<_>>());
    assert_eq!(rig.renderer.fields, 1);
}

#[test]
fn field_end_order() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.run_frame();
    assert_eq!(
        rig.calls(),
        vec![
            "sub_cpu.boundary",
            "audio.output",
            "renderer.end_of_field",
            "sub_cpu.reset",
        ]
    );
    assert_eq!(rig.sub_cpu.boundaries, 1);
    assert_eq!(rig.sub_cpu.resets, 1);
}

#[test]
fn field_audio_and_feedback() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.run_frame();
    assert_eq!(rig.audio.fields.len(), 1);
    assert_eq!(rig.audio.fields[0].0.len(), 735);
    assert!(rig.audio.fields[0].0.iter().any(|&s| s != 0));
    assert_eq!(rig.sound.feedback(), Feedback::NeedMore);

    rig.audio.buffered = 5 * 735;
    rig.run_frame();
    assert_eq!(rig.sound.feedback(), Feedback::Sufficient);
}

#[test]
fn dma_moves_one_line_rate_per_line() {
    let mut rig = Rig::ntsc(display() | VideoFlags::DMA_ENABLE, 0);
    rig.scheduler.start_dma(100);
    assert!(rig.scheduler.dma().is_busy());

    run_to_line(&mut rig, 3);
    assert_eq!(rig.scheduler.dma().transferred(), 3 * 18);
    assert!(rig.scheduler.dma().is_busy());

    rig.run_frame();
    assert_eq!(rig.scheduler.dma().transferred(), 100);
    assert_eq!(rig.scheduler.dma().remaining(), 0);
    assert!(!rig.scheduler.dma().is_busy());
}

#[test]
fn dma_speeds_up_in_blank() {
    let mut rig = Rig::ntsc(display() | VideoFlags::DMA_ENABLE, 0);
    run_to_line(&mut rig, 230);
    rig.scheduler.start_dma(1000);
    let mut last = 0;
    for line in 231..236 {
        run_to_line(&mut rig, line);
        let moved = rig.scheduler.dma().transferred();
        assert!(moved <= 1000);
        assert!(moved - last <= 205);
        last = moved;
    }
    assert_eq!(last, 1000);
    assert!(!rig.scheduler.dma().is_busy());
}

#[test]
fn cpu_overshoot_snaps_to_hint_point() {
    let mut rig = Rig::ntsc(display() | VideoFlags::HINT_ENABLE, 0);
    rig.cpu.overshoot = 30;
    rig.with(|s, snd, hw| {
        while s.phase() != Phase::HDisplay {
            s.run_until_next_event(u32::MAX, snd, hw);
        }
    });
    assert_eq!(rig.scheduler.clock(), rig.scheduler.deadlines().hint);
    assert_eq!(rig.scheduler.remaining(), 40);
}

#[test]
fn cpu_overshoot_kept_without_hint() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.cpu.overshoot = 30;
    rig.with(|s, snd, hw| {
        while s.phase() != Phase::HDisplay {
            s.run_until_next_event(u32::MAX, snd, hw);
        }
    });
    assert_eq!(rig.scheduler.clock(), rig.scheduler.deadlines().hint + 30);
    assert_eq!(rig.scheduler.remaining(), 10);
}

#[test]
fn budget_limits_a_single_run() {
    let mut rig = Rig::ntsc(display(), 0);
    rig.with(|s, snd, hw| s.run_until_next_event(100, snd, hw));
    let consumed = rig.with(|s, snd, hw| s.run_until_next_event(5, snd, hw));
    assert_eq!(consumed, 5);
    assert_eq!(rig.scheduler.clock(), 5);
    assert_eq!(rig.scheduler.phase(), Phase::VintCheck);
}

#[test]
fn freeze_across_field_boundary() {
    let mut rig = Rig::ntsc(display(), 0);
    run_to_line(&mut rig, 261);
    rig.with(|s, snd, hw| s.freeze_for_clocks(2 * 487, snd, hw));
    assert_eq!(rig.scheduler.frames(), 1);
    assert_eq!(rig.audio.fields.len(), 1);
    assert_eq!(rig.scheduler.line(), 1);
}

#[test]
fn video_register_changes_apply_mid_field() {
    let mut rig = Rig::ntsc(display(), 0);
    run_to_line(&mut rig, 100);
    rig.scheduler
        .set_video(VideoRegisters::from_registers(0x10, 0x64, 0x00, 0x81));
    assert!(rig.scheduler.video().hint_enabled());
    rig.run_frame();
    assert_eq!(rig.cpu.interrupts(HINT_LEVEL), 123);
}

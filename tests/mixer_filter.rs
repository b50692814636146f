//! Field mixing and output filtering through the public mixer

mod common;

use approx::assert_relative_eq;
use common::{RecordingAudio, SquareFm};
use genesis_sync::bus::Detached;
use genesis_sync::config::{CoreConfig, PsgConfig, SoundConfig};
use genesis_sync::psg::Sn76489;
use genesis_sync::sound::{DcBlocker, Feedback, MusicLogFormat, SharedMusicLog, SoundMixer};
use genesis_sync::timing::FrameTiming;

fn fm_only(filter_percent: u8) -> CoreConfig {
    CoreConfig {
        sound: SoundConfig {
            psg: false,
            filter_percent,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn render_field(mixer: &mut SoundMixer, fm: &mut SquareFm) {
    let timing = FrameTiming::ntsc();
    mixer.on_field_start();
    for line in 0..timing.total_lines {
        mixer.on_scanline(line, timing.total_lines, fm);
    }
}

fn step_variance(samples: &[i16]) -> f64 {
    let steps: Vec<f64> = samples
        .windows(2)
        .map(|w| (w[1] as f64 - w[0] as f64).abs())
        .collect();
    steps.iter().map(|d| d * d).sum::<f64>() / steps.len() as f64
}

#[test]
fn zero_percent_leaves_only_the_dc_blocker() {
    let mut mixer = SoundMixer::new(&fm_only(0), &FrameTiming::ntsc());
    let mut fm = SquareFm::new(8000, 40);
    render_field(&mut mixer, &mut fm);

    let mut reference = SquareFm::new(8000, 40);
    let mut dc = DcBlocker::new();
    let expected: Vec<i16> = (0..735)
        .map(|_| {
            let mixed = (reference.next_sample() as i32 * 7) >> 3;
            dc.process(mixed) as i16
        })
        .collect();

    assert_eq!(mixer.field().left(), expected.as_slice());
    assert_eq!(mixer.field().right(), expected.as_slice());
}

#[test]
fn zero_percent_sums_psg_and_fm_before_the_dc_blocker() {
    let config = CoreConfig {
        sound: SoundConfig {
            filter_percent: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut mixer = SoundMixer::new(&config, &FrameTiming::ntsc());
    // Tone 0 held high at full volume: a constant 8192 from the PSG
    mixer.psg_write(0x81);
    mixer.psg_write(0x90);
    render_field(&mut mixer, &mut SquareFm::new(6000, 24));

    let psg = (8192 - 0x4000) * 3 / 8;
    assert_eq!(psg, -3072);
    let mut reference = SquareFm::new(6000, 24);
    let mut dc = DcBlocker::new();
    let expected: Vec<i16> = (0..735)
        .map(|_| {
            let fm = (reference.next_sample() as i32 * 7) >> 3;
            dc.process(psg + fm) as i16
        })
        .collect();

    assert_eq!(mixer.field().left(), expected.as_slice());
    assert_eq!(mixer.field().right(), expected.as_slice());
}

#[test]
fn full_strength_smooths_edges() {
    let mut raw = SoundMixer::new(&fm_only(0), &FrameTiming::ntsc());
    let mut smooth = SoundMixer::new(&fm_only(100), &FrameTiming::ntsc());
    render_field(&mut raw, &mut SquareFm::new(8000, 40));
    render_field(&mut smooth, &mut SquareFm::new(8000, 40));

    let raw_var = step_variance(raw.field().left());
    let smooth_var = step_variance(smooth.field().left());
    assert!(
        smooth_var < raw_var / 2.0,
        "filtered step variance {smooth_var} not below raw {raw_var}"
    );
}

#[test]
fn disabled_sound_pushes_silent_fields() {
    let config = CoreConfig {
        sound: SoundConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut mixer = SoundMixer::new(&config, &FrameTiming::ntsc());
    let mut audio = RecordingAudio::default();
    render_field(&mut mixer, &mut SquareFm::new(8000, 40));

    assert_eq!(mixer.on_field_end(&mut audio), Feedback::Sufficient);
    assert_eq!(audio.fields.len(), 1);
    assert!(audio.fields[0].0.iter().all(|&s| s == 0));
    assert_eq!(audio.fields[0].0.len(), 735);
}

#[test]
fn psg_tone_pitch() {
    let timing = FrameTiming::ntsc();
    let mut psg = Sn76489::new(timing.psg_clock, 44_100, PsgConfig::default());
    // Channel 0 period 0x0fe (about 440 Hz), full volume
    psg.write(0x8e);
    psg.write(0x0f);
    psg.write(0x90);

    let mut buf = vec![0u16; 735];
    psg.update(&mut buf);

    let peak = *buf.iter().max().unwrap_or(&0);
    assert_eq!(peak, 8192);
    let edges = buf
        .windows(2)
        .filter(|w| (w[0] > 4096) != (w[1] > 4096))
        .count();
    // 735 samples at about 100 samples per cycle
    assert!((13..=16).contains(&edges), "{edges} edges");

    let duty = buf.iter().filter(|&&s| s > 4096).count() as f64 / buf.len() as f64;
    assert_relative_eq!(duty, 0.5, epsilon = 0.05);
}

#[test]
fn psg_noise_only_mix() {
    let config = CoreConfig {
        sound: SoundConfig {
            fm: false,
            filter_percent: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut mixer = SoundMixer::new(&config, &FrameTiming::ntsc());
    // White noise, fastest rate, full volume
    mixer.psg_write(0xe4);
    mixer.psg_write(0xf0);
    render_field(&mut mixer, &mut SquareFm::new(0, 2));

    let left = mixer.field().left();
    let distinct = {
        let mut values = left.to_vec();
        values.sort_unstable();
        values.dedup();
        values.len()
    };
    assert!(distinct > 10);
    assert_eq!(left, mixer.field().right());
}

#[test]
fn music_log_records_writes_per_field() {
    let mut mixer = SoundMixer::new(&CoreConfig::default(), &FrameTiming::ntsc());
    let log = SharedMusicLog::new();
    mixer.start_music_log(Box::new(log.clone()), MusicLogFormat::Gym);

    mixer.fm_write(0, 0x28, &mut Detached);
    mixer.fm_write(1, 0xf0, &mut Detached);
    mixer.psg_write(0x9f);
    mixer.on_field_end(&mut RecordingAudio::default());

    assert_eq!(mixer.stop_music_log(), Some(1));
    assert_eq!(log.snapshot(), vec![0x01, 0x28, 0xf0, 0x03, 0x9f, 0x00]);
    assert_eq!(mixer.fm_register(0, 0x28), 0xf0);
}

#[test]
fn gnm_music_log_keeps_dac_samples() {
    let mut mixer = SoundMixer::new(&CoreConfig::default(), &FrameTiming::pal());
    let log = SharedMusicLog::new();
    mixer.start_music_log(Box::new(log.clone()), MusicLogFormat::Gnm);
    let mut fm = SquareFm::new(0, 2);

    // First field streams a sample on every line
    mixer.on_field_start();
    for line in 0..313 {
        mixer.fm_write(0, 0x2a, &mut fm);
        mixer.fm_write(1, (line & 0xff) as u8, &mut fm);
        mixer.on_scanline(line, 313, &mut fm);
    }
    mixer.on_field_end(&mut RecordingAudio::default());
    let first = log.take();
    assert_eq!(&first[..3], &[0x00, 0x01, 0x39]);
    // Samples 0x00-0x0f are escaped
    assert_eq!(first.len(), 3 + 313 + 2 * 16);
    assert_eq!(&first[3..7], &[0x04, 0x00, 0x04, 0x01]);

    // Second field has only a PSG write and loses its line records
    mixer.on_field_start();
    mixer.psg_write(0x9f);
    for line in 0..313 {
        mixer.on_scanline(line, 313, &mut fm);
    }
    mixer.on_field_end(&mut RecordingAudio::default());
    assert_eq!(log.take(), vec![0x00, 0x00, 0x00, 0x03, 0x9f]);
    assert_eq!(mixer.stop_music_log(), Some(2));
    // The DAC writes reached the chip
    assert_eq!(fm.writes.len(), 2 * 313);
}

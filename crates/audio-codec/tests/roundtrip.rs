//! File-level save/load tests.

use std::fs;

use audio_codec::{WAV_HEADER_BYTES, WavCodec, WavEncoding};
use echo_core::{AudioBuffer, AudioCodec, EchoError};

fn chirp(len: usize, sample_rate: u32) -> AudioBuffer {
    let samples = (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.4 * (2.0 * std::f32::consts::PI * (220.0 + 200.0 * t) * t).sin()
        })
        .collect();
    AudioBuffer::mono(samples, sample_rate)
}

#[test]
fn test_save_load_float() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.wav");
    let codec = WavCodec::default();
    let buffer = chirp(44_100, 44_100);

    codec.save(&buffer, &path, 44_100).unwrap();
    assert!(fs::metadata(&path).unwrap().len() > WAV_HEADER_BYTES);

    let (loaded, rate) = codec.load(&path).unwrap();
    assert_eq!(rate, 44_100);
    assert_eq!(loaded.channels, 1);
    assert_eq!(loaded.samples, buffer.samples);
    assert!(!loaded.is_silent());
}

#[test]
fn test_save_load_pcm16() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out16.wav");
    let codec = WavCodec::new(WavEncoding::Pcm16);
    let buffer = chirp(4_000, 16_000);

    codec.save(&buffer, &path, 16_000).unwrap();
    let (loaded, rate) = codec.load(&path).unwrap();
    assert_eq!(rate, 16_000);
    assert_eq!(loaded.num_samples(), buffer.num_samples());
    assert!(!loaded.is_silent());
}

#[test]
fn test_stereo_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    let codec = WavCodec::default();
    let samples: Vec<f32> = (0..200).map(|i| if i % 2 == 0 { 0.25 } else { -0.25 }).collect();
    let buffer = AudioBuffer::interleaved(samples, 2, 48_000).unwrap();

    codec.save(&buffer, &path, 48_000).unwrap();
    let (loaded, _) = codec.load(&path).unwrap();
    assert_eq!(loaded.channels, 2);
    assert_eq!(loaded.channel(0), vec![0.25; 100]);
    assert_eq!(loaded.channel(1), vec![-0.25; 100]);
}

#[test]
fn test_header_uses_requested_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rate.wav");
    let codec = WavCodec::default();

    codec.save(&chirp(100, 44_100), &path, 22_050).unwrap();
    let (_, rate) = codec.load(&path).unwrap();
    assert_eq!(rate, 22_050);
}

#[test]
fn test_overwrite_replaces_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("again.wav");
    let codec = WavCodec::default();

    codec.save(&chirp(1_000, 44_100), &path, 44_100).unwrap();
    codec.save(&chirp(500, 44_100), &path, 44_100).unwrap();

    let (loaded, _) = codec.load(&path).unwrap();
    assert_eq!(loaded.num_samples(), 500);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_directory_is_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no/such/dir/out.wav");
    let err = WavCodec::default()
        .save(&chirp(100, 44_100), &path, 44_100)
        .unwrap_err();

    assert!(matches!(err, EchoError::IoFailure { .. }));
    assert!(!path.exists());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = WavCodec::default()
        .load(&dir.path().join("absent.wav"))
        .unwrap_err();
    assert!(matches!(err, EchoError::IoFailure { .. }));
}

#[test]
fn test_load_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.wav");
    fs::write(&path, b"RIFF\x00\x00\x00\x00junkjunkjunk").unwrap();

    let err = WavCodec::default().load(&path).unwrap_err();
    assert!(matches!(
        err,
        EchoError::AudioFormat(_) | EchoError::IoFailure { .. }
    ));
}

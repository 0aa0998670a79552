use super::*;
use crate::foundation::core::{Fps, FrameSize};
use image::AnimationDecoder;

fn cfg() -> StreamConfig {
    StreamConfig {
        size: FrameSize::new(4, 4),
        fps: Fps::new(30, 1).unwrap(),
        background: [255, 255, 255, 255],
    }
}

fn solid(px: [u8; 4]) -> CompositeFrame {
    CompositeFrame {
        size: FrameSize::new(4, 4),
        rgba8_premul: px.repeat(16),
        painted_at: Duration::ZERO,
    }
}

fn decoded_delays(bytes: &[u8]) -> Vec<Duration> {
    let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(bytes)).unwrap();
    decoder
        .into_frames()
        .map(|f| Duration::from(f.unwrap().delay()))
        .collect()
}

#[test]
fn centis_rounds_half_up() {
    assert_eq!(centis(Duration::ZERO), 0);
    assert_eq!(centis(Duration::from_millis(4)), 0);
    assert_eq!(centis(Duration::from_millis(5)), 1);
    assert_eq!(centis(Duration::from_nanos(33_333_333)), 3);
    assert_eq!(centis(Duration::from_nanos(66_666_666)), 7);
}

#[test]
fn total_delay_matches_recording_window() {
    let fps = Fps::new(30, 1).unwrap();
    let mut enc = GifStreamEncoder::new();
    enc.begin(cfg()).unwrap();
    for k in 0..30u64 {
        let shade = (k * 8) as u8;
        enc.push_frame(fps.frame_start(k), &solid([shade, 0, 0, 255]))
            .unwrap();
    }
    let out = enc.finish(Duration::from_secs(1)).unwrap();
    assert_eq!(out.mime, "image/gif");

    let delays = decoded_delays(&out.bytes);
    assert_eq!(delays.len(), 30);
    let total: Duration = delays.iter().sum();
    assert_eq!(total, Duration::from_secs(1));
}

#[test]
fn last_frame_runs_until_end_timestamp() {
    let mut enc = GifStreamEncoder::new();
    enc.begin(cfg()).unwrap();
    enc.push_frame(Duration::ZERO, &solid([0, 0, 0, 255])).unwrap();
    enc.push_frame(Duration::from_millis(100), &solid([255, 255, 255, 255]))
        .unwrap();
    let out = enc.finish(Duration::from_millis(500)).unwrap();
    assert_eq!(
        decoded_delays(&out.bytes),
        vec![Duration::from_millis(100), Duration::from_millis(400)]
    );
}

#[test]
fn out_of_order_timestamps_are_rejected() {
    let mut enc = GifStreamEncoder::new();
    enc.begin(cfg()).unwrap();
    enc.push_frame(Duration::from_millis(50), &solid([0; 4])).unwrap();
    assert!(enc.push_frame(Duration::from_millis(50), &solid([0; 4])).is_err());
}

#[test]
fn finishing_without_frames_is_a_capture_error() {
    let mut enc = GifStreamEncoder::new();
    enc.begin(cfg()).unwrap();
    let err = enc.finish(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, FlipbookError::Capture(_)));
}

#[test]
fn push_before_begin_fails() {
    let mut enc = GifStreamEncoder::new();
    assert!(enc.push_frame(Duration::ZERO, &solid([0; 4])).is_err());
}

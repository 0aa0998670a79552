use super::*;
use crate::capture::encoder::{EncodedStream, InMemoryEncoder};
use crate::render::canvas::CompositeFrame;

fn settings(ms: u64) -> CaptureSettings {
    CaptureSettings {
        fps: Fps::new(30, 1).unwrap(),
        window: RecordingWindow::new(Duration::from_millis(ms)).unwrap(),
        background: [0, 0, 0, 255],
        file_code: Some("card".to_owned()),
    }
}

struct FailingEncoder {
    fail_at: usize,
    pushed: usize,
    aborted: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl StreamEncoder for FailingEncoder {
    fn begin(&mut self, _cfg: StreamConfig) -> FlipbookResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _ts: Duration, _frame: &CompositeFrame) -> FlipbookResult<()> {
        self.pushed += 1;
        if self.pushed >= self.fail_at {
            return Err(FlipbookError::capture("disk full"));
        }
        Ok(())
    }

    fn finish(&mut self, _end_ts: Duration) -> FlipbookResult<EncodedStream> {
        Err(FlipbookError::capture("finalize failed"))
    }

    fn abort(&mut self) {
        self.aborted
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test]
async fn samples_once_per_slot_and_counts_drops() {
    let ledger = ResourceLedger::new();
    let enc = InMemoryEncoder::new();
    let frames = enc.frames();
    let canvas = Canvas::new(FrameSize::new(2, 2)).unwrap();
    let mut handle = CaptureSink::new(settings(1000))
        .begin(FrameSize::new(2, 2), Box::new(enc), &ledger)
        .unwrap();
    assert_eq!(ledger.live_tracks(), 1);

    assert!(handle.observe(&canvas, Duration::ZERO).unwrap());
    assert!(!handle.observe(&canvas, Duration::from_millis(20)).unwrap());
    assert!(handle.observe(&canvas, Duration::from_millis(34)).unwrap());
    // Slots 2 and 3 pass unobserved.
    assert!(handle.observe(&canvas, Duration::from_millis(140)).unwrap());
    assert_eq!(handle.dropped_frames(), 2);
    assert_eq!(handle.captured_frames(), 3);

    let ts: Vec<Duration> = frames.snapshot().iter().map(|f| f.ts).collect();
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(ts, vec![fps.frame_start(0), fps.frame_start(1), fps.frame_start(4)]);

    let artifact = handle.end().await.unwrap();
    assert_eq!(artifact.frame_count(), 3);
    assert_eq!(artifact.duration(), Duration::from_secs(1));
    assert_eq!(artifact.file_name(), "card.rgba");
    assert_eq!(ledger.live_tracks(), 0);
}

#[tokio::test]
async fn nothing_is_sampled_outside_the_window() {
    let ledger = ResourceLedger::new();
    let enc = InMemoryEncoder::new();
    let frames = enc.frames();
    let canvas = Canvas::new(FrameSize::new(1, 1)).unwrap();
    let mut handle = CaptureSink::new(settings(100))
        .begin(FrameSize::new(1, 1), Box::new(enc), &ledger)
        .unwrap();

    assert!(handle.observe(&canvas, Duration::from_millis(99)).unwrap());
    assert!(!handle.observe(&canvas, Duration::from_millis(100)).unwrap());
    assert!(!handle.observe(&canvas, Duration::from_millis(500)).unwrap());
    assert_eq!(frames.len(), 1);
    handle.abort();
    assert_eq!(ledger.live_tracks(), 0);
}

#[tokio::test]
async fn encoder_failure_discards_and_stops_track() {
    let ledger = ResourceLedger::new();
    let aborted = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let enc = FailingEncoder {
        fail_at: 2,
        pushed: 0,
        aborted: aborted.clone(),
    };
    let canvas = Canvas::new(FrameSize::new(1, 1)).unwrap();
    let mut handle = CaptureSink::new(settings(1000))
        .begin(FrameSize::new(1, 1), Box::new(enc), &ledger)
        .unwrap();

    handle.observe(&canvas, Duration::ZERO).unwrap();
    let err = handle
        .observe(&canvas, Duration::from_millis(40))
        .unwrap_err();
    assert!(matches!(err, FlipbookError::Capture(_)));
    assert!(aborted.load(std::sync::atomic::Ordering::SeqCst));
    assert!(!handle.is_recording());
    assert_eq!(ledger.live_tracks(), 0);

    assert!(handle.end().await.is_err());
}

#[tokio::test]
async fn finalize_failure_is_a_capture_error() {
    let ledger = ResourceLedger::new();
    let aborted = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let enc = FailingEncoder {
        fail_at: usize::MAX,
        pushed: 0,
        aborted: aborted.clone(),
    };
    let canvas = Canvas::new(FrameSize::new(1, 1)).unwrap();
    let mut handle = CaptureSink::new(settings(1000))
        .begin(FrameSize::new(1, 1), Box::new(enc), &ledger)
        .unwrap();
    handle.observe(&canvas, Duration::ZERO).unwrap();

    let err = handle.end().await.unwrap_err();
    assert!(matches!(err, FlipbookError::Capture(_)));
    assert!(aborted.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(ledger.live_tracks(), 0);
}

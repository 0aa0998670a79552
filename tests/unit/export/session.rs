use super::*;
use crate::capture::encoder::InMemoryEncoder;
use crate::export::config::ExportFormat;
use crate::export::ledger::scratch_path;
use crate::foundation::core::FrameSize;
use crate::source::animated::RasterFrame;

fn temp_ledger(name: &str) -> ResourceLedger {
    ResourceLedger::with_dir(scratch_path(name, "d"))
}

fn marker_source(count: usize, frame_ms: u64) -> AnimatedSource {
    let size = FrameSize::new(2, 2);
    let frames = (0..count)
        .map(|i| {
            let px = [i as u8 * 60, 0, 0, 255];
            RasterFrame::new(i, size, px.repeat(4), Duration::from_millis(frame_ms)).unwrap()
        })
        .collect();
    AnimatedSource::from_frames(b"source-bytes".to_vec(), size, frames).unwrap()
}

fn short_config(format: ExportFormat) -> ExportConfig {
    ExportConfig {
        duration_ms: 200,
        format,
        layer_load_timeout_ms: 50,
        ..ExportConfig::default()
    }
}

fn missing_engine() -> CodecEngine {
    CodecEngine::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe")
}

#[test]
fn transition_table() {
    use SessionState::*;
    assert!(Idle.can_transition_to(Preparing));
    assert!(Preparing.can_transition_to(Rendering));
    assert!(Preparing.can_transition_to(Finalizing));
    assert!(Rendering.can_transition_to(Finalizing));
    assert!(Finalizing.can_transition_to(Ready));
    assert!(Rendering.can_transition_to(Failed));

    assert!(!Idle.can_transition_to(Rendering));
    assert!(!Rendering.can_transition_to(Preparing));
    assert!(!Ready.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Idle));
    assert!(Ready.is_terminal() && Failed.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn records_into_injected_encoder() {
    let ledger = temp_ledger("session-mem");
    let enc = InMemoryEncoder::new();
    let frames = enc.frames();
    let mut session = ExportSession::new(
        1,
        marker_source(2, 100),
        short_config(ExportFormat::Video),
        ledger.clone(),
    )
    .with_encoder(Box::new(enc));

    let artifact = session.run(&missing_engine()).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(
        session.history(),
        &[
            SessionState::Idle,
            SessionState::Preparing,
            SessionState::Rendering,
            SessionState::Finalizing,
            SessionState::Ready,
        ]
    );
    assert_eq!(frames.len(), 6);
    assert_eq!(session.frames_painted(), 6);
    assert_eq!(artifact.duration(), Duration::from_millis(200));
    assert_eq!(ledger.live_tracks(), 0);
    assert!(session.download_url().is_some_and(ObjectUrl::is_live));

    session.teardown();
    session.teardown();
    assert_eq!(session.release_count(), 1);
    assert_eq!(ledger.live_object_urls(), 0);
    let _ = std::fs::remove_dir_all(ledger.dir());
}

#[tokio::test]
async fn auto_without_text_passes_source_through() {
    let ledger = temp_ledger("session-pass");
    let mut session = ExportSession::new(
        2,
        marker_source(2, 100),
        short_config(ExportFormat::Auto),
        ledger.clone(),
    );
    let artifact = session.run(&missing_engine()).await.unwrap();
    assert_eq!(artifact.bytes(), b"source-bytes");
    assert_eq!(artifact.frame_count(), 0);
    assert!(!session.history().contains(&SessionState::Rendering));
    assert_eq!(ledger.live_tracks(), 0);

    let dir = scratch_path("session-pass-out", "d");
    let saved = session.download_to(&dir).await.unwrap();
    assert_eq!(std::fs::read(saved).unwrap(), b"source-bytes");
    let _ = std::fs::remove_dir_all(dir);
    drop(session);
    assert_eq!(ledger.live_object_urls(), 0);
    let _ = std::fs::remove_dir_all(ledger.dir());
}

#[tokio::test]
async fn video_without_engine_fails_with_init() {
    let ledger = temp_ledger("session-init");
    let mut session = ExportSession::new(
        3,
        marker_source(1, 100),
        short_config(ExportFormat::Video),
        ledger.clone(),
    );
    let err = session.run(&missing_engine()).await.unwrap_err();
    assert!(matches!(err, FlipbookError::Init(_)));
    assert_eq!(session.state(), SessionState::Failed);
    let failure = session.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::Init);
    assert!(failure.detail.contains("nonexistent"));
    assert!(session.artifact().is_none());
    assert_eq!(session.release_count(), 1);
    assert_eq!(ledger.live_object_urls(), 0);
    assert!(session.download_to(ledger.dir()).await.is_err());
    let _ = std::fs::remove_dir_all(ledger.dir());
}

#[tokio::test]
async fn cancelled_before_start_never_renders() {
    let ledger = temp_ledger("session-cancel");
    let mut session = ExportSession::new(
        4,
        marker_source(1, 100),
        short_config(ExportFormat::Gif),
        ledger.clone(),
    );
    session.cancel_token().cancel();
    let err = session.run(&missing_engine()).await.unwrap_err();
    assert!(matches!(err, FlipbookError::Cancelled));
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.frames_painted(), 0);
    assert_eq!(ledger.live_tracks(), 0);
    assert_eq!(ledger.live_object_urls(), 0);
    let _ = std::fs::remove_dir_all(ledger.dir());
}

/// A layer read from a FIFO with no writer stays loading until the test writes to it.
#[cfg(unix)]
#[tokio::test]
async fn cancel_interrupts_a_slow_layer_load() {
    let ledger = temp_ledger("session-slow-layer");
    let fifo = scratch_path("slow-layer", "png");
    let made = std::process::Command::new("mkfifo").arg(&fifo).status();
    if !made.is_ok_and(|s| s.success()) {
        eprintln!("skipping: mkfifo unavailable");
        return;
    }

    let mut config = ExportConfig {
        layer_load_timeout_ms: 60_000,
        ..short_config(ExportFormat::Gif)
    };
    config.layers.background_image = Some(fifo.clone());
    let mut session = ExportSession::new(7, marker_source(1, 100), config, ledger.clone())
        .with_encoder(Box::new(InMemoryEncoder::new()));
    let token = session.cancel_token();

    let engine = missing_engine();
    let started = std::time::Instant::now();
    let (res, ()) = tokio::join!(session.run(&engine), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });
    assert!(matches!(res, Err(FlipbookError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        session.history(),
        &[SessionState::Idle, SessionState::Preparing, SessionState::Failed]
    );
    assert_eq!(session.frames_painted(), 0);
    assert_eq!(ledger.live_object_urls(), 0);

    // Unblock the pending reader so the blocking pool can shut down.
    drop(std::fs::OpenOptions::new().write(true).open(&fifo));
    let _ = std::fs::remove_file(&fifo);
    let _ = std::fs::remove_dir_all(ledger.dir());
}

#[tokio::test]
async fn invalid_config_fails_in_preparing() {
    let ledger = temp_ledger("session-invalid");
    let config = ExportConfig {
        fps: 0,
        ..short_config(ExportFormat::Gif)
    };
    let mut session = ExportSession::new(5, marker_source(1, 100), config, ledger.clone());
    let err = session.run(&missing_engine()).await.unwrap_err();
    assert!(matches!(err, FlipbookError::Validation(_)));
    assert_eq!(
        session.history(),
        &[SessionState::Idle, SessionState::Preparing, SessionState::Failed]
    );
    assert!(session.run(&missing_engine()).await.is_err());
    let _ = std::fs::remove_dir_all(ledger.dir());
}

#[tokio::test]
async fn loading_a_new_source_tears_down_the_old_session() {
    let ledger = temp_ledger("session-ctl");
    let mut controller = ExportController::new(Arc::new(missing_engine()), ledger.clone());
    assert!(controller.run().await.is_err());

    controller.load_source(marker_source(1, 100), short_config(ExportFormat::Auto));
    controller.run().await.unwrap();
    let first = controller.session().unwrap();
    assert_eq!(first.id(), 1);
    assert!(ledger.live_object_urls() > 0);
    let token = controller.cancel_token().unwrap();

    let second = controller.load_source(marker_source(1, 100), short_config(ExportFormat::Auto));
    assert_eq!(second.id(), 2);
    assert_eq!(second.state(), SessionState::Idle);
    assert!(token.is_cancelled());
    assert_eq!(ledger.live_object_urls(), 0);

    controller.start_over();
    assert!(controller.session().is_none());
    let _ = std::fs::remove_dir_all(ledger.dir());
}

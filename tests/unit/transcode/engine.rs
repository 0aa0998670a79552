use super::*;

#[tokio::test]
async fn init_failure_is_terminal() {
    let engine = CodecEngine::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
    assert!(!engine.is_failed());

    let first = engine.ready().await.unwrap_err();
    assert!(matches!(first, FlipbookError::Init(_)));
    assert!(engine.is_failed());

    let second = engine.ready().await.unwrap_err();
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn system_engine_uses_path_lookup() {
    let engine = CodecEngine::default();
    assert_eq!(engine.ffmpeg(), Path::new("ffmpeg"));
    assert_eq!(engine.ffprobe(), Path::new("ffprobe"));
}

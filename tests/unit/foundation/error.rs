use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        FlipbookError::decode("x")
            .to_string()
            .contains("decode error:")
    );
    assert!(FlipbookError::load("x").to_string().contains("load error:"));
    assert!(
        FlipbookError::capture("x")
            .to_string()
            .contains("capture error:")
    );
    assert!(
        FlipbookError::transcode("x")
            .to_string()
            .contains("transcode error:")
    );
    assert!(
        FlipbookError::init("x")
            .to_string()
            .contains("codec engine init error:")
    );
    assert!(
        FlipbookError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn kind_matches_variant() {
    assert_eq!(FlipbookError::capture("x").kind(), ErrorKind::Capture);
    assert_eq!(FlipbookError::Cancelled.kind(), ErrorKind::Cancelled);
    let other = FlipbookError::Other(anyhow::anyhow!("io"));
    assert_eq!(other.kind(), ErrorKind::Other);
}

#[test]
fn user_message_hides_raw_detail() {
    let err = FlipbookError::transcode("ffmpeg exited with status 1: Invalid data");
    assert!(!err.user_message().contains("ffmpeg"));
    assert!(err.to_string().contains("Invalid data"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = FlipbookError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

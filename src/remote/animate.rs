use std::time::Duration;

use reqwest::{Client, Url, multipart};
use serde::Deserialize;

use crate::foundation::error::{FlipbookError, FlipbookResult};

const ANIMATE_PATH: &str = "api/animate";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Successful reply of the animation service.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimateResponse {
    /// Where the generated animation can be fetched. May be relative to the service base URL.
    pub animation_url: String,
    pub upload_id: String,
}

#[derive(Debug, Deserialize)]
struct AnimateErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// HTTP client for the animation-generation service.
#[derive(Clone, Debug)]
pub struct AnimateClient {
    http: Client,
    base: Url,
}

impl AnimateClient {
    /// Create a client for the service at `base_url`.
    pub fn new(base_url: &str) -> FlipbookResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> FlipbookResult<Self> {
        let base = parse_base(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FlipbookError::remote(format!("http client: {e}")))?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a possibly relative animation URL against the service base.
    pub fn resolve(&self, animation_url: &str) -> FlipbookResult<Url> {
        self.base
            .join(animation_url)
            .map_err(|e| FlipbookError::remote(format!("bad animation url '{animation_url}': {e}")))
    }

    /// Upload a drawing as the multipart field `image`.
    #[tracing::instrument(level = "debug", skip_all, fields(file = file_name, bytes = bytes.len()))]
    pub async fn submit_drawing(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> FlipbookResult<AnimateResponse> {
        let url = self.resolve(ANIMATE_PATH)?;
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_owned());
        let form = multipart::Form::new().part("image", part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FlipbookError::remote(format!("submit drawing: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FlipbookError::remote(format!("read response: {e}")))?;
        let parsed = parse_animate_response(status.is_success(), &body);
        if let Err(err) = &parsed {
            tracing::warn!(%status, error = %err, "animation service rejected drawing");
        }
        parsed
    }

    /// Download the generated animation.
    pub async fn fetch_animation(&self, animation_url: &str) -> FlipbookResult<Vec<u8>> {
        let url = self.resolve(animation_url)?;
        tracing::debug!(%url, "fetching animation");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FlipbookError::remote(format!("fetch animation: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FlipbookError::remote(format!("read animation: {e}")))?;
        Ok(bytes.to_vec())
    }
}

fn parse_base(base_url: &str) -> FlipbookResult<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| FlipbookError::validation(format!("service url '{base_url}': {e}")))?;
    // `join` replaces the last path segment unless the base ends in '/'.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn parse_animate_response(success: bool, body: &str) -> FlipbookResult<AnimateResponse> {
    if success && let Ok(ok) = serde_json::from_str::<AnimateResponse>(body) {
        return Ok(ok);
    }
    match serde_json::from_str::<AnimateErrorBody>(body) {
        Ok(AnimateErrorBody {
            error,
            details: Some(details),
        }) => Err(FlipbookError::remote(format!("{error}: {details}"))),
        Ok(AnimateErrorBody { error, .. }) => Err(FlipbookError::remote(error)),
        Err(_) => Err(FlipbookError::remote(format!(
            "unexpected response: {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/remote/animate.rs"]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::encoder::StreamEncoder;
use crate::capture::ffmpeg::FfmpegStreamEncoder;
use crate::capture::gif::GifStreamEncoder;
use crate::capture::sink::{CaptureHandle, CaptureSettings, CaptureSink};
use crate::export::artifact::{ExportArtifact, suggest_file_name, unix_millis};
use crate::export::config::{ExportConfig, OutputPlan};
use crate::export::ledger::{ObjectUrl, ResourceLedger};
use crate::export::ticker::{CancelToken, PaintTicker};
use crate::foundation::error::{ErrorKind, FlipbookError, FlipbookResult};
use crate::render::canvas::Canvas;
use crate::render::compositor::{Compositor, LayerImageCache};
use crate::source::animated::AnimatedSource;
use crate::source::player::FramePlayer;
use crate::transcode::bridge::{decode_video_frames, transcode_to_video};
use crate::transcode::engine::CodecEngine;

/// Lifecycle of an export session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Preparing,
    Rendering,
    Finalizing,
    Ready,
    Failed,
}

impl SessionState {
    /// Return `true` when `next` is a legal successor of `self`.
    ///
    /// `Preparing -> Finalizing` is the pass-through path that skips rendering.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Idle, Failed)
                | (Preparing, Rendering)
                | (Preparing, Finalizing)
                | (Preparing, Failed)
                | (Rendering, Finalizing)
                | (Rendering, Failed)
                | (Finalizing, Ready)
                | (Finalizing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Why a session ended in [`SessionState::Failed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    /// Short message for the end user.
    pub message: String,
    /// Raw error string for diagnostics.
    pub detail: String,
}

impl SessionFailure {
    fn from_error(err: &FlipbookError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message().to_owned(),
            detail: err.to_string(),
        }
    }
}

/// Everything a session must give back when it ends. Released exactly once.
struct SessionResources {
    ledger: ResourceLedger,
    urls: Vec<ObjectUrl>,
    capture: Option<CaptureHandle>,
    released: bool,
    releases: u32,
}

impl SessionResources {
    fn new(ledger: ResourceLedger) -> Self {
        Self {
            ledger,
            urls: Vec::new(),
            capture: None,
            released: false,
            releases: 0,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.releases += 1;
        if let Some(capture) = self.capture.take() {
            capture.abort();
        }
        let revoked = self.urls.drain(..).filter(|u| u.revoke()).count();
        tracing::debug!(revoked, "session resources released");
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.release();
    }
}

/// One export: source, layers, capture, and the resulting artifact.
pub struct ExportSession {
    id: u64,
    state: SessionState,
    history: Vec<SessionState>,
    source: AnimatedSource,
    config: ExportConfig,
    cancel: CancelToken,
    resources: SessionResources,
    encoder: Option<Box<dyn StreamEncoder>>,
    artifact: Option<ExportArtifact>,
    download_url: Option<ObjectUrl>,
    failure: Option<SessionFailure>,
    frames_painted: u64,
}

impl ExportSession {
    pub fn new(id: u64, source: AnimatedSource, config: ExportConfig, ledger: ResourceLedger) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
            source,
            config,
            cancel: CancelToken::new(),
            resources: SessionResources::new(ledger),
            encoder: None,
            artifact: None,
            download_url: None,
            failure: None,
            frames_painted: 0,
        }
    }

    /// Record into `encoder` instead of the encoder implied by the configured format.
    pub fn with_encoder(mut self, encoder: Box<dyn StreamEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state the session has been in, in order.
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn source(&self) -> &AnimatedSource {
        &self.source
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Token that stops the session at its next check.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn artifact(&self) -> Option<&ExportArtifact> {
        self.artifact.as_ref()
    }

    /// Object URL of the finished artifact.
    pub fn download_url(&self) -> Option<&ObjectUrl> {
        self.download_url.as_ref()
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    /// Composite frames painted during rendering.
    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    /// How many times resources were released (0 or 1).
    pub fn release_count(&self) -> u32 {
        self.resources.releases
    }

    /// Save the finished artifact into `dir` under its suggested name.
    pub async fn download_to(&self, dir: &Path) -> FlipbookResult<PathBuf> {
        match (&self.state, &self.artifact) {
            (SessionState::Ready, Some(artifact)) => artifact.save_to(dir).await,
            _ => Err(FlipbookError::validation(format!(
                "session {} has no artifact (state {:?})",
                self.id, self.state
            ))),
        }
    }

    /// Cancel and release everything the session owns. Safe to call in any state.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.resources.release();
    }

    /// Drive the session from `idle` to `ready` or `failed`.
    #[tracing::instrument(level = "info", skip_all, fields(session = self.id))]
    pub async fn run(&mut self, engine: &CodecEngine) -> FlipbookResult<ExportArtifact> {
        if self.state != SessionState::Idle {
            return Err(FlipbookError::validation(format!(
                "session {} already ran (state {:?})",
                self.id, self.state
            )));
        }
        match self.drive(engine).await {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    async fn drive(&mut self, engine: &CodecEngine) -> FlipbookResult<ExportArtifact> {
        self.transition(SessionState::Preparing)?;
        self.config.validate()?;
        let plan = self.config.output_plan();

        let preview = self
            .resources
            .ledger
            .create_object_url(self.source.bytes(), self.source.format().extension())
            .await?;
        self.resources.urls.push(preview);

        let artifact = if plan == OutputPlan::Passthrough {
            self.check_cancel()?;
            self.transition(SessionState::Finalizing)?;
            self.passthrough_artifact()
        } else {
            let (source, compositor) = self.prepare(engine, plan).await?;
            self.check_cancel()?;
            self.transition(SessionState::Rendering)?;
            self.render(engine, plan, &source, compositor).await?;

            self.transition(SessionState::Finalizing)?;
            let capture = self
                .resources
                .capture
                .take()
                .ok_or_else(|| FlipbookError::capture("capture stream missing at finalize"))?;
            capture.end().await?
        };
        self.check_cancel()?;

        let url = artifact.object_url(&self.resources.ledger).await?;
        self.resources.urls.push(url.clone());
        self.download_url = Some(url);
        self.artifact = Some(artifact.clone());
        self.transition(SessionState::Ready)?;
        tracing::info!(
            file = artifact.file_name(),
            mime = artifact.mime(),
            bytes = artifact.bytes().len(),
            "export ready"
        );
        Ok(artifact)
    }

    async fn prepare(
        &mut self,
        engine: &CodecEngine,
        plan: OutputPlan,
    ) -> FlipbookResult<(AnimatedSource, Compositor)> {
        let mut images = LayerImageCache::spawn_loads(&self.config.layers);
        self.unless_cancelled(images.settle(self.config.layer_load_timeout()))
            .await?;

        let needs_engine = self.config.transcode.is_some()
            || (matches!(plan, OutputPlan::Video(_)) && self.encoder.is_none());
        if needs_engine {
            self.unless_cancelled(engine.ready()).await??;
        }

        let source = match self.config.transcode {
            Some(opts) => {
                let video = self
                    .unless_cancelled(transcode_to_video(engine, self.source.bytes(), opts))
                    .await??;
                self.unless_cancelled(decode_video_frames(engine, &video))
                    .await??
            }
            None => self.source.clone(),
        };
        Ok((source, Compositor::new(images)))
    }

    async fn render(
        &mut self,
        engine: &CodecEngine,
        plan: OutputPlan,
        source: &AnimatedSource,
        mut compositor: Compositor,
    ) -> FlipbookResult<()> {
        let fps = self.config.fps()?;
        let window = self.config.window()?;
        let layers = self.config.layers.clone();

        let mut player = FramePlayer::new(source.sequence()?);
        let size = player.frame_at(Duration::ZERO)?.size;
        let mut canvas = Canvas::new(size)?;

        let encoder = match self.encoder.take() {
            Some(encoder) => encoder,
            None => make_encoder(engine, plan)?,
        };
        let sink = CaptureSink::new(CaptureSettings {
            fps,
            window,
            background: self.config.matte.to_rgba8(),
            file_code: self.config.file_code.clone(),
        });
        self.resources.capture = Some(sink.begin(size, encoder, &self.resources.ledger)?);

        let mut ticker = PaintTicker::start(fps);
        loop {
            let elapsed = ticker.tick().await;
            self.check_cancel()?;
            if !window.contains(elapsed) {
                break;
            }
            let frame = player.frame_at(elapsed)?;
            compositor.composite(&mut canvas, frame, &layers, elapsed)?;
            self.frames_painted += 1;
            if let Some(capture) = self.resources.capture.as_mut() {
                capture.observe(&canvas, elapsed)?;
            }
        }
        tracing::debug!(
            painted = self.frames_painted,
            skipped_ticks = ticker.skipped(),
            skipped_frames = player.skipped_frames(),
            "paint loop finished"
        );
        Ok(())
    }

    fn passthrough_artifact(&self) -> ExportArtifact {
        let ext = self.source.format().extension();
        ExportArtifact::new(
            self.source.bytes().clone(),
            self.source.mime(),
            ext,
            suggest_file_name(self.config.file_code.as_deref(), ext, unix_millis()),
            Duration::ZERO,
            0,
        )
    }

    /// Await `fut`, giving up as soon as the session is cancelled.
    async fn unless_cancelled<F: std::future::Future>(&self, fut: F) -> FlipbookResult<F::Output> {
        self.cancel
            .run_until_cancelled(fut)
            .await
            .ok_or(FlipbookError::Cancelled)
    }

    fn check_cancel(&self) -> FlipbookResult<()> {
        if self.cancel.is_cancelled() {
            return Err(FlipbookError::Cancelled);
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) -> FlipbookResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(FlipbookError::Other(anyhow::anyhow!(
                "illegal session transition {:?} -> {:?}",
                self.state,
                next
            )));
        }
        tracing::info!(session = self.id, from = ?self.state, to = ?next, "session state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, err: &FlipbookError) {
        if matches!(err, FlipbookError::Cancelled) {
            tracing::info!(session = self.id, "session cancelled");
        } else {
            tracing::error!(session = self.id, error = %err, "session failed");
        }
        if !self.state.is_terminal() {
            self.state = SessionState::Failed;
            self.history.push(SessionState::Failed);
        }
        self.failure = Some(SessionFailure::from_error(err));
        self.artifact = None;
        self.download_url = None;
        self.resources.release();
    }
}

fn make_encoder(engine: &CodecEngine, plan: OutputPlan) -> FlipbookResult<Box<dyn StreamEncoder>> {
    match plan {
        OutputPlan::Video(container) => Ok(Box::new(FfmpegStreamEncoder::new(
            engine.ffmpeg(),
            container,
        ))),
        OutputPlan::Gif => Ok(Box::new(GifStreamEncoder::new())),
        OutputPlan::Passthrough => Err(FlipbookError::validation(
            "pass-through exports do not record",
        )),
    }
}

/// Owns the codec engine, the resource ledger and at most one export session.
pub struct ExportController {
    engine: Arc<CodecEngine>,
    ledger: ResourceLedger,
    session: Option<ExportSession>,
    next_id: u64,
}

impl ExportController {
    pub fn new(engine: Arc<CodecEngine>, ledger: ResourceLedger) -> Self {
        Self {
            engine,
            ledger,
            session: None,
            next_id: 1,
        }
    }

    pub fn engine(&self) -> &Arc<CodecEngine> {
        &self.engine
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn session(&self) -> Option<&ExportSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ExportSession> {
        self.session.as_mut()
    }

    /// Tear down the current session, then start a new idle one for `source`.
    pub fn load_source(
        &mut self,
        source: AnimatedSource,
        config: ExportConfig,
    ) -> &mut ExportSession {
        self.start_over();
        let id = self.next_id;
        self.next_id += 1;
        tracing::info!(session = id, mime = source.mime(), "source loaded");
        self.session
            .insert(ExportSession::new(id, source, config, self.ledger.clone()))
    }

    /// Cancel and release the current session, if any.
    pub fn start_over(&mut self) {
        if let Some(mut session) = self.session.take() {
            tracing::info!(session = session.id(), "starting over");
            session.teardown();
        }
    }

    /// Cancellation token of the current session.
    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.session.as_ref().map(ExportSession::cancel_token)
    }

    /// Run the current session to completion.
    pub async fn run(&mut self) -> FlipbookResult<ExportArtifact> {
        let engine = self.engine.clone();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| FlipbookError::validation("no source loaded"))?;
        session.run(&engine).await
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/session.rs"]
mod tests;

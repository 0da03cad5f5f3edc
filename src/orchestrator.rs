//! Generation Orchestrator.
//!
//! Drives one generation attempt at a time: eligibility check, submission,
//! outcome classification, and the cooldown that gates the next attempt.
//! Phases are never stored; they are derived from the in-flight stage and the
//! Wait State.

use crate::client::StylizerClient;
use crate::countdown::{Countdown, CountdownMode};
use crate::error::StylizerError;
use crate::platform::{Platform, SharePayload};
use crate::types::{GeneratedAvatar, GenerationOutcome, Style};
use crate::upload::{AcceptedFile, CandidateFile, Gatekeeper};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// The network step an attempt is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckingEligibility,
    Submitting,
}

/// The workflow phase a renderer should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CheckingEligibility,
    Submitting,
    Cooldown,
}

impl Phase {
    pub fn derive(stage: Option<Stage>, wait_seconds: u64) -> Self {
        match stage {
            Some(Stage::CheckingEligibility) => Phase::CheckingEligibility,
            Some(Stage::Submitting) => Phase::Submitting,
            None if wait_seconds > 0 => Phase::Cooldown,
            None => Phase::Idle,
        }
    }
}

/// A read-only window onto a running orchestrator, for presentation code.
#[derive(Debug, Clone)]
pub struct WorkflowView {
    stage: watch::Receiver<Option<Stage>>,
    wait: watch::Receiver<u64>,
}

impl WorkflowView {
    pub fn phase(&self) -> Phase {
        Phase::derive(*self.stage.borrow(), *self.wait.borrow())
    }

    pub fn remaining(&self) -> u64 {
        *self.wait.borrow()
    }

    /// True while a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.stage.borrow().is_some()
    }

    /// Waits until the Wait State changes. Returns `false` once the
    /// orchestrator has been torn down.
    pub async fn wait_changed(&mut self) -> bool {
        self.wait.changed().await.is_ok()
    }
}

/// Clears the in-flight stage when an attempt ends, including when its future
/// is dropped mid-request.
struct StageReset(Arc<watch::Sender<Option<Stage>>>);

impl Drop for StageReset {
    fn drop(&mut self) {
        self.0.send_replace(None);
    }
}

pub struct Orchestrator<P: Platform> {
    client: StylizerClient,
    platform: P,
    gatekeeper: Gatekeeper,
    style: Style,
    countdown: Countdown,
    stage: Arc<watch::Sender<Option<Stage>>>,
    result: Option<GeneratedAvatar>,
}

impl<P: Platform> Orchestrator<P> {
    pub fn new(client: StylizerClient, platform: P) -> Self {
        let (stage, _rx) = watch::channel(None);
        Self {
            client,
            platform,
            gatekeeper: Gatekeeper::new(),
            style: Style::default(),
            countdown: Countdown::new(CountdownMode::Scheduled),
            stage: Arc::new(stage),
            result: None,
        }
    }

    /// Chooses how the cooldown advances. Any running countdown is discarded.
    pub fn with_countdown_mode(mut self, mode: CountdownMode) -> Self {
        self.countdown = Countdown::new(mode);
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Offers a file to the gatekeeper.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The file picked or dropped by the user.
    ///
    /// # Returns
    ///
    /// The accepted file with its preview, now the current candidate.
    ///
    /// # Errors
    ///
    /// - `StylizerError::FileRejected` for a file that is too large or of an
    ///   unsupported type.
    /// - `StylizerError::IoError` if the file cannot be read.
    ///
    /// Errors are notified and leave the previous candidate in place.
    pub fn select_file(&mut self, candidate: CandidateFile) -> Result<&AcceptedFile, StylizerError> {
        match self.gatekeeper.accept(candidate) {
            Ok(accepted) => Ok(accepted),
            Err(e) => {
                self.platform.notify(&e.selection_notice());
                Err(e)
            }
        }
    }

    /// Offers several files; only the first is considered.
    pub fn select_files<I>(&mut self, offered: I) -> Option<Result<&AcceptedFile, StylizerError>>
    where
        I: IntoIterator<Item = CandidateFile>,
    {
        let first = offered.into_iter().next()?;
        Some(self.select_file(first))
    }

    pub fn candidate(&self) -> Option<&AcceptedFile> {
        self.gatekeeper.current()
    }

    pub fn live_previews(&self) -> usize {
        self.gatekeeper.live_previews()
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn result(&self) -> Option<&GeneratedAvatar> {
        self.result.as_ref()
    }

    pub fn wait_seconds(&self) -> u64 {
        self.countdown.remaining()
    }

    pub fn cooldown_progress(&self) -> f32 {
        self.countdown.progress()
    }

    pub fn phase(&self) -> Phase {
        Phase::derive(*self.stage.borrow(), self.countdown.remaining())
    }

    /// Whether the generate trigger should be enabled.
    pub fn can_submit(&self) -> bool {
        self.stage.borrow().is_none()
            && self.countdown.remaining() == 0
            && self.gatekeeper.current().is_some()
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            stage: self.stage.subscribe(),
            wait: self.countdown.subscribe(),
        }
    }

    /// Advances the cooldown by one second. Returns the remaining wait.
    pub fn tick_countdown(&self) -> u64 {
        self.countdown.tick()
    }

    /// Runs one generation attempt with the current candidate and style.
    ///
    /// The eligibility check runs first and fails open when the status endpoint
    /// cannot answer. The submitted bytes are the validated preview copy, so
    /// later changes to the original file are never sent.
    ///
    /// Every error is notified through the platform before it is returned.
    /// A rate-limit error also starts a cooldown. A successful result replaces
    /// the previous one; failures never clear it.
    ///
    /// Dropping the returned future cancels the in-flight request rather than
    /// letting it finish in the background. A cancelled attempt records nothing
    /// and leaves the orchestrator idle, ready for the next request.
    ///
    /// # Returns
    ///
    /// The [`GeneratedAvatar`] stored as the new result.
    ///
    /// # Errors
    ///
    /// - `StylizerError::NoFileSelected` before any network call.
    /// - `StylizerError::RateLimited` when the status check or the server refuses.
    /// - `StylizerError::GenerationFailed` with the server's detail.
    /// - `StylizerError::GenerationFailedGeneric` when no detail is available.
    /// - `StylizerError::FileRejected` if the preview copy changed on disk.
    pub async fn request_generation(&mut self) -> Result<GeneratedAvatar, StylizerError> {
        let reset = StageReset(Arc::clone(&self.stage));
        let outcome = self.run_generation().await;
        drop(reset);

        if let Err(e) = &outcome {
            self.platform.notify(&e.notice());
        }
        outcome
    }

    async fn run_generation(&mut self) -> Result<GeneratedAvatar, StylizerError> {
        let submission = self
            .gatekeeper
            .current()
            .ok_or(StylizerError::NoFileSelected)?
            .submission();
        let style = self.style;

        self.stage.send_replace(Some(Stage::CheckingEligibility));
        match self.client.rate_limit_status().await {
            Ok(status) if !status.can_request => {
                info!(wait_seconds = status.wait_time, "rate limited before submission");
                self.countdown.set(status.wait_time);
                return Err(StylizerError::RateLimited {
                    wait_seconds: status.wait_time,
                });
            }
            Ok(_) => {}
            Err(e) => {
                // Fail open: the status check is advisory.
                let unavailable = StylizerError::EligibilityCheckUnavailable(e.to_string());
                warn!(error = %unavailable, "proceeding without eligibility check");
            }
        }

        self.stage.send_replace(Some(Stage::Submitting));
        let outcome = match self.client.generate_avatar(&submission, style).await {
            Ok(outcome) => outcome,
            Err(e @ StylizerError::FileRejected(_)) => {
                warn!(error = %e, "preview copy no longer matches the validated file");
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "could not prepare generation request");
                return Err(StylizerError::GenerationFailedGeneric);
            }
        };

        match outcome {
            GenerationOutcome::Success { image_url } => {
                info!(%style, "avatar generated");
                let avatar = GeneratedAvatar {
                    image_url,
                    style,
                    generated_at: Utc::now(),
                };
                self.result = Some(avatar.clone());
                Ok(avatar)
            }
            GenerationOutcome::RateLimited {
                wait_seconds,
                detail,
            } => {
                warn!(wait_seconds, %detail, "rejected by server rate limit");
                self.countdown.set(wait_seconds);
                Err(StylizerError::RateLimited { wait_seconds })
            }
            GenerationOutcome::StructuredError { status, detail } => {
                warn!(status, %detail, "generation rejected");
                Err(StylizerError::GenerationFailed { detail })
            }
            GenerationOutcome::TransportError { reason } => {
                error!(%reason, "generation failed without detail");
                Err(StylizerError::GenerationFailedGeneric)
            }
        }
    }

    /// Saves the current result as `stylized-avatar-<style>.png`, using the
    /// style the result was generated with.
    ///
    /// # Returns
    ///
    /// The saved path, or `Ok(None)` without touching the platform when there
    /// is no result.
    ///
    /// # Errors
    ///
    /// `StylizerError::DownloadFailed` when the platform cannot save. The
    /// failure is notified.
    pub async fn download_result(&self) -> Result<Option<PathBuf>, StylizerError> {
        let Some(avatar) = &self.result else {
            return Ok(None);
        };

        let file_name = avatar.style.download_file_name();
        match self.platform.save_as(&avatar.image_url, &file_name).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                let e = match e {
                    StylizerError::DownloadFailed { .. } => e,
                    other => StylizerError::DownloadFailed {
                        message: other.to_string(),
                    },
                };
                self.platform.notify(&e.notice());
                Err(e)
            }
        }
    }

    /// Shares the current result through the platform with a fixed title and text.
    ///
    /// # Returns
    ///
    /// `Ok(true)` once shared, or `Ok(false)` without touching the platform
    /// when there is no result.
    ///
    /// # Errors
    ///
    /// `StylizerError::ShareUnsupported` when the capability is missing or the
    /// user cancels. The failure is notified.
    pub async fn share_result(&self) -> Result<bool, StylizerError> {
        let Some(avatar) = &self.result else {
            return Ok(false);
        };

        let payload = SharePayload::for_result(avatar.image_url.clone());
        match self.platform.share(&payload).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(error = %e, "share failed");
                let e = StylizerError::ShareUnsupported;
                self.platform.notify(&e.notice());
                Err(e)
            }
        }
    }

    /// Stops the countdown and revokes the preview. Any view reports the
    /// teardown through [`WorkflowView::wait_changed`].
    pub fn teardown(mut self) {
        self.countdown.stop();
        self.gatekeeper.release();
        debug!("orchestrator torn down");
    }
}

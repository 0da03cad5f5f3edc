//! A client-side workflow controller for a remote avatar stylization service.
//!
//! The crate validates a candidate image, cooperates with the server's rate
//! limiter, submits styled-avatar requests and turns the responses into
//! result and cooldown state that a UI can render.
//!
//! ## Features
//! - Upload validation (JPEG, PNG or WebP up to 5 MiB) with a single revocable preview.
//! - Advisory rate-limit check that fails open when the status endpoint is down.
//! - Typed classification of generation responses, including 429 wait parsing.
//! - A one-second countdown task that re-enables submission when the wait elapses.
//! - Save-as and share of the generated image through a pluggable [`Platform`].
//!
//! ## Example
//!
//! ```no_run
//! # use avatar_stylizer::{CandidateFile, LocalPlatform, Orchestrator, Style, StylizerClient};
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let client = StylizerClient::new(None)?;
//! let platform = LocalPlatform::new(client.clone(), "downloads");
//! let mut orchestrator = Orchestrator::new(client, platform);
//!
//! orchestrator.select_file(CandidateFile::from_path("me.png")?)?;
//! orchestrator.set_style(Style::Fantasy);
//! let avatar = orchestrator.request_generation().await?;
//! println!("Generated: {}", avatar.image_url);
//! orchestrator.download_result().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod countdown;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod types;
pub mod upload;

pub use client::{parse_wait_detail, StylizerClient};
pub use countdown::{format_wait_time, Countdown, CountdownMode};
pub use error::StylizerError;
pub use orchestrator::{Orchestrator, Phase, Stage, WorkflowView};
pub use platform::{LocalPlatform, Notice, NoticeLevel, Platform, SharePayload};
pub use types::{GeneratedAvatar, GenerationOutcome, HealthStatus, RateLimitStatus, Style};
pub use upload::{
    AcceptedFile, CandidateFile, FileSource, Gatekeeper, ImageKind, PreviewHandle, RejectReason,
    MAX_FILE_SIZE,
};

//! Platform capabilities the orchestrator drives: save-as, share and
//! user-facing notifications.

use crate::client::StylizerClient;
use crate::error::StylizerError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const SHARE_TITLE: &str = "My Stylized Avatar";
pub const SHARE_TEXT: &str = "Check out my stylized avatar!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient notification with a short title and a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// What gets handed to the platform share capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn for_result(url: impl Into<String>) -> Self {
        Self {
            title: SHARE_TITLE.to_string(),
            text: SHARE_TEXT.to_string(),
            url: url.into(),
        }
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Saves the image behind `image_url` under `file_name`.
    async fn save_as(&self, image_url: &str, file_name: &str) -> Result<PathBuf, StylizerError>;

    /// Hands `payload` to the platform share sheet. May be unsupported or
    /// cancelled by the user.
    async fn share(&self, payload: &SharePayload) -> Result<(), StylizerError>;

    /// Shows a transient notification.
    fn notify(&self, notice: &Notice);
}

/// A headless platform: saves into a directory, logs notices, cannot share.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    client: StylizerClient,
    dest_dir: PathBuf,
}

impl LocalPlatform {
    pub fn new<P: AsRef<Path>>(client: StylizerClient, dest_dir: P) -> Self {
        Self {
            client,
            dest_dir: dest_dir.as_ref().to_path_buf(),
        }
    }

    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }
}

#[async_trait]
impl Platform for LocalPlatform {
    async fn save_as(&self, image_url: &str, file_name: &str) -> Result<PathBuf, StylizerError> {
        let file_path = self.dest_dir.join(file_name);

        if let Some(bytes) = decode_data_url(image_url)? {
            tokio::fs::create_dir_all(&self.dest_dir).await?;
            tokio::fs::write(&file_path, bytes).await?;
        } else {
            self.client.download_image(image_url, &file_path).await?;
        }

        info!(path = %file_path.display(), "result saved");
        Ok(file_path)
    }

    async fn share(&self, _payload: &SharePayload) -> Result<(), StylizerError> {
        Err(StylizerError::ShareUnsupported)
    }

    fn notify(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!(title = %notice.title, "{}", notice.message),
            NoticeLevel::Warning => warn!(title = %notice.title, "{}", notice.message),
            NoticeLevel::Error => error!(title = %notice.title, "{}", notice.message),
        }
    }
}

/// Decodes a base64 `data:` URL. Returns `Ok(None)` for any other scheme.
pub fn decode_data_url(reference: &str) -> Result<Option<Vec<u8>>, StylizerError> {
    let Some(rest) = reference.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StylizerError::InvalidDataUrl("missing payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(StylizerError::InvalidDataUrl(format!(
            "unsupported encoding `{}`",
            header
        )));
    }
    STANDARD
        .decode(payload)
        .map(Some)
        .map_err(|e| StylizerError::InvalidDataUrl(e.to_string()))
}

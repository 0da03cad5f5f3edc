use crate::countdown::format_wait_time;
use crate::platform::{Notice, NoticeLevel};
use crate::upload::RejectReason;

#[derive(Debug, thiserror::Error)]
pub enum StylizerError {
    #[error("No image selected")]
    NoFileSelected,
    #[error("File rejected: {0}")]
    FileRejected(#[from] RejectReason),
    #[error("Rate limit status unavailable: {0}")]
    EligibilityCheckUnavailable(String),
    #[error("Rate limited, next request allowed in {wait_seconds}s")]
    RateLimited { wait_seconds: u64 },
    #[error("Generation failed: {detail}")]
    GenerationFailed { detail: String },
    #[error("Generation failed")]
    GenerationFailedGeneric,
    #[error("Sharing is not supported on this platform")]
    ShareUnsupported,
    #[error("Download failed: {message}")]
    DownloadFailed { message: String },
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("API request failed: {message}")]
    ApiError { message: String },
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
}

impl StylizerError {
    /// The notification shown when selecting a file fails. I/O errors here are
    /// about the picked file, not about generation.
    pub fn selection_notice(&self) -> Notice {
        match self {
            StylizerError::IoError(_) => Notice::error(
                "Could not read file",
                "The selected image could not be read. Please choose another file",
            ),
            other => other.notice(),
        }
    }

    /// The transient notification shown to the user for this error.
    ///
    /// `EligibilityCheckUnavailable` is only logged by the orchestrator and
    /// falls through to the generic message.
    pub fn notice(&self) -> Notice {
        match self {
            StylizerError::NoFileSelected => {
                Notice::error("No image selected", "Please upload an image first")
            }
            StylizerError::FileRejected(RejectReason::TooLarge { .. }) => {
                Notice::error("File too large", "Please select an image smaller than 5MB")
            }
            StylizerError::FileRejected(RejectReason::UnsupportedType { .. }) => Notice::error(
                "Unsupported file type",
                "Please select a JPEG, PNG or WebP image",
            ),
            StylizerError::FileRejected(RejectReason::Changed { .. }) => Notice::error(
                "File changed",
                "The selected image changed on disk. Please select it again",
            ),
            StylizerError::RateLimited { wait_seconds } => Notice {
                level: NoticeLevel::Warning,
                title: "Rate Limit".to_string(),
                message: format!(
                    "Please wait {} before generating another avatar",
                    format_wait_time(*wait_seconds)
                ),
            },
            StylizerError::GenerationFailed { detail } => Notice::error("Error", detail),
            StylizerError::ShareUnsupported => Notice::error(
                "Error",
                "Failed to share. Your platform might not support sharing.",
            ),
            StylizerError::DownloadFailed { message } => {
                Notice::error("Download failed", message)
            }
            _ => Notice::error("Error", "Failed to generate avatar. Please try again."),
        }
    }
}

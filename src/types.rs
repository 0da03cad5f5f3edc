use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of styles the remote service can apply.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Anime,
    Cyberpunk,
    Fantasy,
    Business,
}

impl Style {
    /// Every selectable style, in menu order.
    pub const ALL: [Style; 4] = [Style::Anime, Style::Cyberpunk, Style::Fantasy, Style::Business];

    /// The wire name sent as the `style` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Anime => "anime",
            Style::Cyberpunk => "cyberpunk",
            Style::Fantasy => "fantasy",
            Style::Business => "business",
        }
    }

    /// The human-readable menu label.
    pub fn label(&self) -> &'static str {
        match self {
            Style::Anime => "Anime",
            Style::Cyberpunk => "Cyberpunk",
            Style::Fantasy => "Fantasy",
            Style::Business => "Business",
        }
    }

    /// The file name used when saving a result generated with this style.
    pub fn download_file_name(&self) -> String {
        format!("stylized-avatar-{}.png", self.as_str())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown style `{0}`")]
pub struct UnknownStyle(pub String);

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Style::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStyle(s.to_string()))
    }
}

/// Response of the advisory rate-limit status endpoint.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether a generation request would currently be accepted.
    pub can_request: bool,
    /// Seconds until the next request is allowed. Only meaningful when `can_request` is false.
    #[serde(default)]
    pub wait_time: u64,
}

/// (Internal) Body of a successful generate-avatar response.
#[derive(Debug, Deserialize, Default)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub(crate) image_url: Option<String>,
    #[serde(default)]
    pub(crate) image_base64: Option<String>,
}

impl GenerateResponse {
    /// Resolves the body into a single image reference. A bare base64 payload
    /// becomes a `data:` URL.
    pub(crate) fn into_image_ref(self) -> Option<String> {
        match (self.image_url, self.image_base64) {
            (Some(url), _) if !url.is_empty() => Some(url),
            (_, Some(b64)) if !b64.is_empty() => Some(format!("data:image/png;base64,{}", b64)),
            _ => None,
        }
    }
}

/// (Internal) Error body returned by the service, e.g. `{ "detail": "..." }`.
#[derive(Debug, Deserialize, Default)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(crate) fn detail_text(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// The classified outcome of one generate-avatar request, decoded once at the
/// network boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The service produced an image.
    Success { image_url: String },
    /// HTTP 429 with a parseable wait duration.
    RateLimited { wait_seconds: u64, detail: String },
    /// A non-success status carrying a `detail` message.
    StructuredError { status: u16, detail: String },
    /// No usable response: connection failure, missing detail, or a success
    /// body without an image reference.
    TransportError { reason: String },
}

/// Response of the health check.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
}

/// The stored result of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAvatar {
    /// Reference to the produced image (`http(s)` or `data:` URL).
    pub image_url: String,
    /// The style the image was generated with.
    pub style: Style,
    pub generated_at: DateTime<Utc>,
}

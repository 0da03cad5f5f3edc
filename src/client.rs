use crate::error::StylizerError;
use crate::types::{
    ErrorBody, GenerateResponse, GenerationOutcome, HealthStatus, RateLimitStatus, Style,
};
use crate::upload::{CandidateFile, FileSource, RejectReason};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{multipart, StatusCode};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::{debug, error, info};
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000/";

static WAIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"wait (\d+) minutes and (\d+) seconds").unwrap());

/// Extracts the wait duration from a rate-limit detail such as
/// `"Please wait 2 minutes and 5 seconds"`.
pub fn parse_wait_detail(detail: &str) -> Option<u64> {
    let caps = WAIT_RE.captures(detail)?;
    let minutes: u64 = caps[1].parse().ok()?;
    let seconds: u64 = caps[2].parse().ok()?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Maps a non-success status and its optional detail to an outcome.
pub(crate) fn classify_failure(status: StatusCode, detail: Option<String>) -> GenerationOutcome {
    match detail {
        Some(detail) => {
            if status == StatusCode::TOO_MANY_REQUESTS {
                if let Some(wait_seconds) = parse_wait_detail(&detail) {
                    return GenerationOutcome::RateLimited {
                        wait_seconds,
                        detail,
                    };
                }
            }
            GenerationOutcome::StructuredError {
                status: status.as_u16(),
                detail,
            }
        }
        None => GenerationOutcome::TransportError {
            reason: format!("HTTP {} without detail", status),
        },
    }
}

/// The client for the avatar stylization service.
///
/// It holds the shared `reqwest::Client` and the base URL for all API requests.
/// It is cheap to clone and safe to share across threads.
#[derive(Clone, Debug)]
pub struct StylizerClient {
    client: reqwest::Client,
    base_url: Url,
}

impl StylizerClient {
    /// Creates a new `StylizerClient`.
    ///
    /// Uses `base_url` when given, then the `AVATAR_API_URL` environment
    /// variable, then `http://localhost:8000/`.
    ///
    /// # Errors
    ///
    /// - `StylizerError::RequestFailed` if the internal HTTP client fails to build.
    /// - `StylizerError::UrlParseFailed` if the resolved URL is invalid.
    pub fn new(base_url: Option<String>) -> Result<Self, StylizerError> {
        let base_url = base_url
            .or_else(|| env::var("AVATAR_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self::new_with_url(&base_url)
    }

    /// Creates a new `StylizerClient` against an explicit base URL.
    ///
    /// This is useful for testing against a mock server. A trailing `/` is
    /// appended when missing so endpoint joins stay under the base path.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the service (e.g., a mock server URI).
    ///
    /// # Errors
    ///
    /// - `StylizerError::RequestFailed` if the internal HTTP client fails to build.
    /// - `StylizerError::UrlParseFailed` if `base_url` is invalid.
    pub fn new_with_url(base_url: &str) -> Result<Self, StylizerError> {
        let client = reqwest::Client::builder().build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Asks the service whether a generation request would currently be accepted.
    ///
    /// The call is side-effect free and safe to issue speculatively.
    ///
    /// # Returns
    ///
    /// A [`RateLimitStatus`] with `can_request` and the remaining `wait_time`.
    ///
    /// # Errors
    ///
    /// - `StylizerError::RequestFailed` on a network failure.
    /// - `StylizerError::ApiError` on a non-success status.
    /// - `StylizerError::ResponseParseFailed` if the body lacks the expected fields.
    pub async fn rate_limit_status(&self) -> Result<RateLimitStatus, StylizerError> {
        let url = self.base_url.join("rate-limit-status")?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(StylizerError::ApiError {
                message: format!("rate limit status returned {}", response.status()),
            })
        }
    }

    /// Submits `candidate` for stylization and classifies the response.
    ///
    /// The file is sent as the `file` part of a multipart body and the style as
    /// the `style` query parameter.
    ///
    /// # Arguments
    ///
    /// * `candidate` - The file to submit. Disk candidates are streamed.
    /// * `style` - The style to apply.
    ///
    /// # Returns
    ///
    /// The [`GenerationOutcome`]. Every server or transport outcome is folded
    /// into it, including connection failures.
    ///
    /// # Errors
    ///
    /// An `Err` only means the request could not be prepared locally:
    /// - `StylizerError::FileRejected` if a disk candidate no longer has the
    ///   length it was validated with.
    /// - `StylizerError::IoError` if a disk candidate cannot be opened.
    /// - `StylizerError::UrlParseFailed` / `StylizerError::RequestFailed` for an
    ///   invalid endpoint or MIME type.
    pub async fn generate_avatar(
        &self,
        candidate: &CandidateFile,
        style: Style,
    ) -> Result<GenerationOutcome, StylizerError> {
        let url = self.base_url.join("generate-avatar")?;
        let form = multipart::Form::new().part("file", file_part(candidate).await?);

        info!(style = %style, file = %candidate.file_name, "submitting generation request");
        let response = match self
            .client
            .post(url)
            .query(&[("style", style.as_str())])
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "generation request failed to complete");
                return Ok(GenerationOutcome::TransportError {
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status();
        debug!(%status, "generation response received");

        if status.is_success() {
            let body: GenerateResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    return Ok(GenerationOutcome::TransportError {
                        reason: format!("unreadable response body: {}", e),
                    })
                }
            };
            Ok(match body.into_image_ref() {
                Some(image_url) => GenerationOutcome::Success { image_url },
                None => GenerationOutcome::TransportError {
                    reason: "No image URL in response".to_string(),
                },
            })
        } else {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(ErrorBody::detail_text);
            Ok(classify_failure(status, detail))
        }
    }

    /// Probes the service health endpoint.
    ///
    /// # Returns
    ///
    /// A [`HealthStatus`] carrying the service's self-reported status.
    ///
    /// # Errors
    ///
    /// - `StylizerError::RequestFailed` on a network failure or undecodable body.
    /// - `StylizerError::ApiError` on a non-success status.
    pub async fn health(&self) -> Result<HealthStatus, StylizerError> {
        let url = self.base_url.join("health")?;
        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let error_body: serde_json::Value = response.json().await.unwrap_or_default();
            Err(StylizerError::ApiError {
                message: format!("API error: {}", error_body),
            })
        }
    }

    /// Downloads an `http(s)` image reference to `file_path`, creating parent
    /// directories as needed. The body is streamed to disk chunk by chunk.
    ///
    /// # Arguments
    ///
    /// * `image_url` - The image reference returned by a successful generation.
    /// * `file_path` - Where to write the file.
    ///
    /// # Returns
    ///
    /// The `PathBuf` of the written file.
    ///
    /// # Errors
    ///
    /// - `StylizerError::DownloadFailed` on a non-success status.
    /// - `StylizerError::UrlParseFailed` if `image_url` is not a URL.
    /// - `StylizerError::RequestFailed` / `StylizerError::IoError` if the
    ///   transfer or the write fails.
    pub async fn download_image<P: AsRef<Path>>(
        &self,
        image_url: &str,
        file_path: P,
    ) -> Result<PathBuf, StylizerError> {
        let url = Url::parse(image_url)?;
        let mut response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(StylizerError::DownloadFailed {
                message: format!("status {}", response.status()),
            });
        }

        let file_path = file_path.as_ref();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(file_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(file_path.to_path_buf())
    }
}

async fn file_part(candidate: &CandidateFile) -> Result<multipart::Part, StylizerError> {
    let part = match &candidate.source {
        FileSource::Memory(bytes) => multipart::Part::bytes(bytes.clone()),
        FileSource::Disk(path) => {
            let file = File::open(path).await?;
            let actual = file.metadata().await?.len();
            if actual != candidate.size {
                return Err(RejectReason::Changed {
                    expected: candidate.size,
                    actual,
                }
                .into());
            }
            let stream = FramedRead::new(file, BytesCodec::new());
            multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), candidate.size)
        }
    };
    Ok(part
        .file_name(candidate.file_name.clone())
        .mime_str(&candidate.mime_type)?)
}

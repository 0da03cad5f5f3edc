//! Upload Gatekeeper.
//!
//! Validates candidate images against the accepted types and the 5 MiB size
//! limit, and owns the single live preview of the current candidate.

use crate::error::StylizerError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info};

/// Largest accepted candidate, in bytes.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Image subtypes the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Classifies a MIME type, ignoring case and parameters.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Webp => "webp",
        }
    }
}

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("file is too large ({size} bytes, limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("unsupported file type `{mime}`")]
    UnsupportedType { mime: String },
    #[error("file changed after it was accepted ({expected} bytes, now {actual})")]
    Changed { expected: u64, actual: u64 },
}

/// Where the candidate's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

/// A file offered by the user, not yet validated.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub file_name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl CandidateFile {
    /// A candidate held in memory, e.g. handed over by a drop widget.
    pub fn from_bytes(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// A candidate on disk. The MIME type is guessed from the extension and the
    /// size is read from metadata; the contents are not loaded.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StylizerError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StylizerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Could not determine file name",
                ))
            })?
            .to_string();
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        Ok(Self {
            file_name,
            mime_type,
            size: metadata.len(),
            source: FileSource::Disk(path.to_path_buf()),
        })
    }
}

/// A revocable handle to the preview copy of the current candidate.
///
/// The backing temporary file is deleted when the handle is dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    path: TempPath,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!(preview = self.id, "preview released");
    }
}

/// A validated candidate bound to its preview.
#[derive(Debug)]
pub struct AcceptedFile {
    pub candidate: CandidateFile,
    pub kind: ImageKind,
    pub preview: PreviewHandle,
}

impl AcceptedFile {
    /// The candidate as it should be submitted: the validated preview copy,
    /// not the original source, which may have changed since.
    pub fn submission(&self) -> CandidateFile {
        CandidateFile {
            file_name: self.candidate.file_name.clone(),
            mime_type: self.candidate.mime_type.clone(),
            size: self.candidate.size,
            source: FileSource::Disk(self.preview.path().to_path_buf()),
        }
    }
}

/// Owns the "current candidate" slot. At most one preview is live at a time.
#[derive(Debug, Default)]
pub struct Gatekeeper {
    current: Option<AcceptedFile>,
    live: Arc<AtomicUsize>,
    next_id: u64,
}

impl Gatekeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks size and type without touching the slot.
    pub fn validate(candidate: &CandidateFile) -> Result<ImageKind, RejectReason> {
        if candidate.size > MAX_FILE_SIZE {
            return Err(RejectReason::TooLarge {
                size: candidate.size,
                limit: MAX_FILE_SIZE,
            });
        }
        ImageKind::from_mime(&candidate.mime_type).ok_or_else(|| RejectReason::UnsupportedType {
            mime: candidate.mime_type.clone(),
        })
    }

    /// Validates `candidate` and, on success, replaces the current candidate.
    ///
    /// The candidate is copied into an unbound preview file first. Any failure
    /// up to that point leaves the slot untouched. Once the copy exists the
    /// previous preview is released and the new one is bound.
    ///
    /// # Errors
    ///
    /// - `StylizerError::FileRejected` if the size or type is not accepted,
    ///   including when the copied bytes exceed the limit.
    /// - `StylizerError::IoError` if the source cannot be read or the preview
    ///   cannot be written.
    pub fn accept(&mut self, mut candidate: CandidateFile) -> Result<&AcceptedFile, StylizerError> {
        let kind = Self::validate(&candidate)?;

        let (snapshot, copied) = Self::snapshot(&candidate, kind)?;
        if copied != candidate.size {
            debug!(
                expected = candidate.size,
                copied, "source changed while copying, validating the copy"
            );
            candidate.size = copied;
            Self::validate(&candidate)?;
        }

        self.release();
        let preview = self.bind_preview(snapshot);
        info!(
            file = %candidate.file_name,
            size = candidate.size,
            mime = kind.mime(),
            "candidate accepted"
        );

        Ok(&*self.current.insert(AcceptedFile {
            candidate,
            kind,
            preview,
        }))
    }

    /// Accepts the first offered file. Any further files are ignored.
    pub fn accept_first<I>(&mut self, offered: I) -> Option<Result<&AcceptedFile, StylizerError>>
    where
        I: IntoIterator<Item = CandidateFile>,
    {
        let first = offered.into_iter().next()?;
        Some(self.accept(first))
    }

    pub fn current(&self) -> Option<&AcceptedFile> {
        self.current.as_ref()
    }

    /// Number of preview handles currently alive.
    pub fn live_previews(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Drops the current candidate and revokes its preview.
    pub fn release(&mut self) {
        self.current = None;
    }

    /// Copies the candidate into a fresh temporary file. At most one byte past
    /// the limit is read from disk.
    fn snapshot(
        candidate: &CandidateFile,
        kind: ImageKind,
    ) -> Result<(NamedTempFile, u64), StylizerError> {
        let mut file = tempfile::Builder::new()
            .prefix("avatar-preview-")
            .suffix(&format!(".{}", kind.extension()))
            .tempfile()?;
        let copied = match &candidate.source {
            FileSource::Memory(bytes) => {
                file.write_all(bytes)?;
                bytes.len() as u64
            }
            FileSource::Disk(path) => {
                let source = std::fs::File::open(path)?;
                std::io::copy(&mut source.take(MAX_FILE_SIZE + 1), &mut file)?
            }
        };
        file.flush()?;
        Ok((file, copied))
    }

    fn bind_preview(&mut self, snapshot: NamedTempFile) -> PreviewHandle {
        self.next_id += 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        PreviewHandle {
            id: self.next_id,
            path: snapshot.into_temp_path(),
            live: Arc::clone(&self.live),
        }
    }
}

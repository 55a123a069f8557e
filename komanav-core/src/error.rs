use std::path::PathBuf;

use thiserror::Error;

/// Errors originating from the panel metadata and navigation core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no panel metadata found for {}", document.display())]
    MetadataNotFound { document: PathBuf },

    #[error("malformed panel metadata in {}: {reason}", path.display())]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("page {page} is outside every chapter (chapters cover {covered} pages)")]
    ChapterNotFound { page: u32, covered: u32 },
}

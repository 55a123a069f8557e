use std::path::PathBuf;

use thiserror::Error;

/// Errors originating from the render gateway and the panel viewer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("host has no dimensions for page {page}")]
    PageUnavailable { page: u32 },

    #[error("invalid render rect on page {page}: {width}×{height}")]
    EmptyRect { page: u32, width: f64, height: f64 },

    #[error("host could not render page {page}")]
    RenderFailed { page: u32 },

    #[error("no panels on page {page}")]
    NoPanels { page: u32 },

    #[error("panel viewer is closed")]
    Closed,

    #[error("failed to export {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },

    #[error(transparent)]
    Core(#[from] komanav_core::CoreError),
}

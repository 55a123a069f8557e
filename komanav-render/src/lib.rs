pub mod buffer;
pub mod error;
pub mod export;
pub mod gateway;
pub mod postprocess;
pub mod preload;
pub mod viewer;

pub use buffer::RenderBuffer;
pub use error::RenderError;
pub use export::{export_png, PanelExportMetadata};
pub use gateway::{fit_zoom, DocumentHost, RenderGateway, RenderRequest, RenderSettings};
pub use postprocess::{post_process, Applied};
pub use preload::{PreloadCache, PreloadEntry};
pub use viewer::{DisplayedPanel, PanelView, PanelViewer, ViewerConfig, ViewerEvent, ViewerTask};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;

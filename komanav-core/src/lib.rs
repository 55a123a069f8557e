pub mod clock;
pub mod cursor;
pub mod error;
pub mod index;
pub mod panel;
pub mod rect;
pub mod schedule;
pub mod source;
pub mod tap;

// Re-export primary types for convenience.
pub use clock::{Clock, ManualClock, SystemClock};
pub use cursor::{CursorState, Landing, NavigationCursor, NavigationState, Step, Transition};
pub use error::CoreError;
pub use index::{candidate_paths, resolve_chapter, PanelIndex};
pub use panel::{
    ChapterDescriptor, ChapterIndex, DocumentPanelData, FlatPanelData, PageEntry, Panel,
    ReadingDirection,
};
pub use rect::{apply_padding, to_pixel_rect, Padding, PaddingConfig, PixelRect, Rect};
pub use schedule::Timers;
pub use source::{FsSource, MemorySource, MetadataSource};
pub use tap::{TapAction, TapZones};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;

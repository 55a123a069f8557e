//! Panel metadata model and the parse step that normalizes every accepted
//! JSON shape into [`DocumentPanelData`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

/// A sub-rectangle of a page, in page-relative coordinates.
///
/// All four fields are fractions of the page size in `[0, 1]`. The order of
/// panels inside a page is the reading order and is never re-sorted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Panel {
    #[inline]
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Centre of the panel in normalized coordinates.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

// ---------------------------------------------------------------------------
// Reading direction
// ---------------------------------------------------------------------------

/// Which side of the screen advances the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    /// Left-to-right (Western comics).
    Ltr,
    /// Right-to-left (Japanese manga). The detection tool writes this by default.
    #[default]
    Rtl,
}

impl ReadingDirection {
    /// Lenient parse of the `reading_direction` field.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ltr" | "left_to_right" | "left-to-right" => Some(Self::Ltr),
            "rtl" | "right_to_left" | "right-to-left" => Some(Self::Rtl),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pages and chapters
// ---------------------------------------------------------------------------

/// Panels for one page of the host document.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// 1-based page number matching the host's numbering.
    pub page: u32,
    /// Source image filename recorded by the detection tool, if any.
    pub image: Option<String>,
    pub panels: Vec<Panel>,
}

/// One entry of a chapter index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDescriptor {
    pub name: String,
    /// Per-chapter metadata file, relative to the index file's directory.
    pub json_file: String,
    pub total_pages: u32,
}

/// A master document that maps global page numbers onto per-chapter files.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterIndex {
    pub reading_direction: Option<ReadingDirection>,
    pub chapters: Vec<ChapterDescriptor>,
    /// Directory of the index file; `json_file` paths resolve against it.
    pub base_dir: PathBuf,
}

impl ChapterIndex {
    /// Sum of every chapter's stated page count, saturating at `u32::MAX`.
    pub fn covered_pages(&self) -> u32 {
        self.chapters
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.total_pages))
    }

    /// Location of a chapter's own metadata file.
    pub fn chapter_path(&self, chapter: &ChapterDescriptor) -> PathBuf {
        self.base_dir.join(&chapter.json_file)
    }
}

/// Panel data for a document that lists its pages directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatPanelData {
    pub reading_direction: Option<ReadingDirection>,
    pub total_pages: Option<u32>,
    /// Primary array form, scanned in order.
    pub pages: Vec<PageEntry>,
    /// Legacy object form keyed by filename or page number.
    pub legacy: BTreeMap<String, Vec<Panel>>,
    /// Bare top-level `panels` array, applied to every page.
    pub fallback: Vec<Panel>,
}

impl FlatPanelData {
    /// Panels for `page`, in reading order.
    ///
    /// The `pages` array is scanned first. Only when it yields nothing are the
    /// legacy keys tried: the page's filename, the page number as a string,
    /// then any numeric key whose value equals the page number. The bare
    /// `panels` array is the last resort.
    pub fn panels_for_page(&self, page: u32, page_name: Option<&str>) -> &[Panel] {
        if let Some(entry) = self.pages.iter().find(|e| e.page == page) {
            return &entry.panels;
        }

        if let Some(name) = page_name {
            if let Some(panels) = self.legacy.get(name) {
                return panels;
            }
            if let Some(entry) = self
                .pages
                .iter()
                .find(|e| e.image.as_deref() == Some(name))
            {
                return &entry.panels;
            }
        }

        if let Some(panels) = self.legacy.get(&page.to_string()) {
            return panels;
        }

        if let Some((_, panels)) = self
            .legacy
            .iter()
            .find(|(key, _)| key.trim().parse::<u32>().ok() == Some(page))
        {
            return panels;
        }

        &self.fallback
    }
}

/// Normalized panel metadata for a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentPanelData {
    Flat(FlatPanelData),
    Chapters(ChapterIndex),
}

impl DocumentPanelData {
    /// Direction stated at the top level of the file, if any.
    pub fn reading_direction(&self) -> Option<ReadingDirection> {
        match self {
            Self::Flat(flat) => flat.reading_direction,
            Self::Chapters(index) => index.reading_direction,
        }
    }

    /// Parse a metadata file. `path` is used for error messages and to
    /// anchor relative chapter file paths.
    pub fn parse(json: &str, path: &Path) -> crate::Result<Self> {
        let raw: RawDocument =
            serde_json::from_str(json).map_err(|e| CoreError::MalformedMetadata {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        raw.normalize(path)
    }
}

// ---------------------------------------------------------------------------
// Raw JSON shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    reading_direction: Option<String>,
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default)]
    pages: Option<RawPages>,
    #[serde(default)]
    chapters: Option<Vec<ChapterDescriptor>>,
    #[serde(default)]
    panels: Option<Vec<Panel>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPages {
    List(Vec<RawPageEntry>),
    Table(BTreeMap<String, RawPageValue>),
}

#[derive(Debug, Deserialize)]
struct RawPageEntry {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    panels: Vec<Panel>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPageValue {
    Panels(Vec<Panel>),
    Entry {
        #[serde(default)]
        panels: Vec<Panel>,
    },
}

impl RawDocument {
    fn normalize(self, path: &Path) -> crate::Result<DocumentPanelData> {
        let reading_direction = self.reading_direction.as_deref().and_then(|value| {
            let parsed = ReadingDirection::parse(value);
            if parsed.is_none() {
                warn!(value, path = %path.display(), "Unknown reading direction, ignoring");
            }
            parsed
        });

        if let Some(chapters) = self.chapters.filter(|c| !c.is_empty()) {
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Ok(DocumentPanelData::Chapters(ChapterIndex {
                reading_direction,
                chapters,
                base_dir,
            }));
        }

        if self.pages.is_none() && self.panels.is_none() {
            return Err(CoreError::MalformedMetadata {
                path: path.to_path_buf(),
                reason: "expected one of `pages`, `chapters`, or `panels`".into(),
            });
        }

        let mut flat = FlatPanelData {
            reading_direction,
            total_pages: self.total_pages,
            fallback: self.panels.unwrap_or_default(),
            ..Default::default()
        };

        match self.pages {
            Some(RawPages::List(entries)) => {
                // Entries without a page number take their 1-based position.
                flat.pages = entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| PageEntry {
                        page: e.page.unwrap_or(i as u32 + 1),
                        image: e.image,
                        panels: e.panels,
                    })
                    .collect();
            }
            Some(RawPages::Table(table)) => {
                flat.legacy = table
                    .into_iter()
                    .map(|(key, value)| {
                        let panels = match value {
                            RawPageValue::Panels(p) | RawPageValue::Entry { panels: p } => p,
                        };
                        (key, panels)
                    })
                    .collect();
            }
            None => {}
        }

        Ok(DocumentPanelData::Flat(flat))
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::panel::{
    ChapterDescriptor, ChapterIndex, DocumentPanelData, FlatPanelData, Panel, ReadingDirection,
};
use crate::source::{FsSource, MetadataSource};

/// Sub-directory the detection tool writes its results into.
pub const RESULT_DIR: &str = "panel_result";

/// Metadata locations tried for a document, in priority order.
///
/// For `/books/vol1.cbz` these are `/books/vol1.json`,
/// `/books/panel_result/vol1.json` and `/books/../panel_result/vol1.json`.
pub fn candidate_paths(document: &Path) -> Vec<PathBuf> {
    let dir = document.parent().unwrap_or_else(|| Path::new(""));
    let stem = document.file_stem().unwrap_or(document.as_os_str());
    let mut file_name = stem.to_os_string();
    file_name.push(".json");

    vec![
        dir.join(&file_name),
        dir.join(RESULT_DIR).join(&file_name),
        dir.join("..").join(RESULT_DIR).join(&file_name),
    ]
}

/// Map a global page number onto a chapter and a 1-based local page.
///
/// Chapters are walked in order, subtracting each chapter's page count from
/// the remainder until it fits.
pub fn resolve_chapter(
    index: &ChapterIndex,
    global_page: u32,
) -> crate::Result<(&ChapterDescriptor, u32)> {
    let not_found = || CoreError::ChapterNotFound {
        page: global_page,
        covered: index.covered_pages(),
    };
    if global_page == 0 {
        return Err(not_found());
    }

    let mut remainder = global_page;
    for chapter in &index.chapters {
        if remainder <= chapter.total_pages {
            return Ok((chapter, remainder));
        }
        remainder -= chapter.total_pages;
    }
    Err(not_found())
}

/// Loads and caches panel metadata for documents and their chapter files.
///
/// Entries are written once on first load and never invalidated; the index
/// lives exactly as long as the viewer session that owns it.
pub struct PanelIndex<S = FsSource> {
    source: S,
    documents: HashMap<PathBuf, Arc<DocumentPanelData>>,
    chapters: HashMap<PathBuf, Arc<FlatPanelData>>,
}

impl PanelIndex<FsSource> {
    /// Index backed by the local filesystem.
    pub fn from_fs() -> Self {
        Self::new(FsSource)
    }
}

impl<S: MetadataSource> PanelIndex<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            documents: HashMap::new(),
            chapters: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether metadata for `document` is already cached.
    pub fn is_cached(&self, document: &Path) -> bool {
        self.documents.contains_key(document)
    }

    /// Load metadata for `document`, reusing the cached copy when present.
    ///
    /// The first existing candidate path wins. An unreadable or malformed
    /// file is reported as [`CoreError::MetadataNotFound`] so the caller
    /// falls back to plain page viewing.
    pub fn load(&mut self, document: &Path) -> crate::Result<Arc<DocumentPanelData>> {
        if let Some(data) = self.documents.get(document) {
            return Ok(Arc::clone(data));
        }

        let not_found = || CoreError::MetadataNotFound {
            document: document.to_path_buf(),
        };
        let path = candidate_paths(document)
            .into_iter()
            .find(|p| self.source.exists(p))
            .ok_or_else(not_found)?;

        let json = self.source.read_to_string(&path).map_err(|e| {
            warn!(path = %path.display(), "Failed to read panel metadata: {e}");
            not_found()
        })?;
        let data = DocumentPanelData::parse(&json, &path).map_err(|e| {
            warn!("{e}");
            not_found()
        })?;

        info!(
            document = %document.display(),
            metadata = %path.display(),
            chapters = matches!(data, DocumentPanelData::Chapters(_)),
            "Loaded panel metadata"
        );
        let data = Arc::new(data);
        self.documents
            .insert(document.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    /// Panels for a (global) page, in reading order. Empty when nothing is
    /// known about the page.
    pub fn panels_for_page(
        &mut self,
        data: &DocumentPanelData,
        page: u32,
        page_name: Option<&str>,
    ) -> Vec<Panel> {
        match data {
            DocumentPanelData::Flat(flat) => flat.panels_for_page(page, page_name).to_vec(),
            DocumentPanelData::Chapters(index) => {
                let (path, local_page) = match resolve_chapter(index, page) {
                    Ok((chapter, local)) => (index.chapter_path(chapter), local),
                    Err(e) => {
                        warn!("{e}");
                        return Vec::new();
                    }
                };
                match self.load_chapter(&path) {
                    Some(flat) => {
                        debug!(page, local_page, chapter = %path.display(), "Resolved chapter page");
                        flat.panels_for_page(local_page, page_name).to_vec()
                    }
                    None => Vec::new(),
                }
            }
        }
    }

    /// Reading direction in effect on `page`.
    ///
    /// A chapter file's own direction wins over the index's; with nothing
    /// stated anywhere the default is right-to-left.
    pub fn reading_direction(&mut self, data: &DocumentPanelData, page: u32) -> ReadingDirection {
        let chapter_direction = match data {
            DocumentPanelData::Flat(_) => None,
            DocumentPanelData::Chapters(index) => resolve_chapter(index, page)
                .ok()
                .map(|(chapter, _)| index.chapter_path(chapter))
                .and_then(|path| self.load_chapter(&path))
                .and_then(|flat| flat.reading_direction),
        };
        chapter_direction
            .or_else(|| data.reading_direction())
            .unwrap_or_default()
    }

    /// Load a per-chapter file, caching successful loads by path.
    fn load_chapter(&mut self, path: &Path) -> Option<Arc<FlatPanelData>> {
        if let Some(flat) = self.chapters.get(path) {
            return Some(Arc::clone(flat));
        }
        if !self.source.exists(path) {
            warn!(path = %path.display(), "Chapter metadata file is missing");
            return None;
        }
        let json = match self.source.read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                warn!(path = %path.display(), "Failed to read chapter metadata: {e}");
                return None;
            }
        };
        let flat = match DocumentPanelData::parse(&json, path) {
            Ok(DocumentPanelData::Flat(flat)) => flat,
            Ok(DocumentPanelData::Chapters(_)) => {
                warn!(path = %path.display(), "Nested chapter indexes are not supported");
                return None;
            }
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };
        let flat = Arc::new(flat);
        self.chapters.insert(path.to_path_buf(), Arc::clone(&flat));
        Some(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const FLAT: &str = r#"{"reading_direction": "ltr", "pages": [
        {"page": 1, "panels": [{"x":0.0,"y":0.0,"w":1.0,"h":0.5}, {"x":0.0,"y":0.5,"w":1.0,"h":0.5}]},
        {"page": 2, "panels": []}
    ]}"#;

    fn chapters(totals: &[u32]) -> ChapterIndex {
        ChapterIndex {
            reading_direction: None,
            chapters: totals
                .iter()
                .enumerate()
                .map(|(i, &total_pages)| ChapterDescriptor {
                    name: format!("Chapter {}", i + 1),
                    json_file: format!("ch{}.json", i + 1),
                    total_pages,
                })
                .collect(),
            base_dir: PathBuf::from("/books"),
        }
    }

    #[test]
    fn candidate_order() {
        let paths = candidate_paths(Path::new("/books/vol1.cbz"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/books/vol1.json"),
                PathBuf::from("/books/panel_result/vol1.json"),
                PathBuf::from("/books/../panel_result/vol1.json"),
            ]
        );
    }

    #[test]
    fn candidate_paths_for_relative_document() {
        let paths = candidate_paths(Path::new("vol1.cbz"));
        assert_eq!(paths[0], PathBuf::from("vol1.json"));
        assert_eq!(paths[2], PathBuf::from("../panel_result/vol1.json"));
    }

    #[test]
    fn resolves_chapter_by_cumulative_subtraction() {
        let index = chapters(&[10, 15]);
        let (chapter, local) = resolve_chapter(&index, 12).unwrap();
        assert_eq!(chapter.name, "Chapter 2");
        assert_eq!(local, 2);

        let (chapter, local) = resolve_chapter(&index, 10).unwrap();
        assert_eq!(chapter.name, "Chapter 1");
        assert_eq!(local, 10);

        let (chapter, local) = resolve_chapter(&index, 25).unwrap();
        assert_eq!(chapter.name, "Chapter 2");
        assert_eq!(local, 15);
    }

    #[test]
    fn chapter_resolution_out_of_range() {
        let index = chapters(&[10, 15]);
        assert!(matches!(
            resolve_chapter(&index, 26),
            Err(CoreError::ChapterNotFound { page: 26, covered: 25 })
        ));
        assert!(resolve_chapter(&index, 0).is_err());
    }

    #[test]
    fn oversized_chapter_totals_saturate() {
        let index = chapters(&[u32::MAX, 2]);
        assert_eq!(index.covered_pages(), u32::MAX);
        assert!(matches!(
            resolve_chapter(&index, 0),
            Err(CoreError::ChapterNotFound {
                page: 0,
                covered: u32::MAX
            })
        ));

        let (chapter, local) = resolve_chapter(&index, u32::MAX).unwrap();
        assert_eq!(chapter.name, "Chapter 1");
        assert_eq!(local, u32::MAX);
    }

    #[test]
    fn falls_through_candidates() {
        let source = MemorySource::new().with_file("/books/panel_result/vol1.json", FLAT);
        let mut index = PanelIndex::new(source);
        let data = index.load(Path::new("/books/vol1.cbz")).unwrap();
        assert_eq!(index.panels_for_page(&data, 1, None).len(), 2);
    }

    #[test]
    fn same_directory_wins() {
        let source = MemorySource::new()
            .with_file("/books/vol1.json", FLAT)
            .with_file("/books/panel_result/vol1.json", r#"{"panels": []}"#);
        let mut index = PanelIndex::new(source);
        let data = index.load(Path::new("/books/vol1.cbz")).unwrap();
        assert_eq!(index.panels_for_page(&data, 1, None).len(), 2);
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let source = MemorySource::new().with_file("/books/vol1.json", FLAT);
        let mut index = PanelIndex::new(source);
        let first = index.load(Path::new("/books/vol1.cbz")).unwrap();
        let second = index.load(Path::new("/books/vol1.cbz")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(index.source().reads(), 1);
        assert!(index.is_cached(Path::new("/books/vol1.cbz")));
    }

    #[test]
    fn missing_metadata_is_not_found() {
        let mut index = PanelIndex::new(MemorySource::new());
        assert!(matches!(
            index.load(Path::new("/books/vol1.cbz")),
            Err(CoreError::MetadataNotFound { .. })
        ));
    }

    #[test]
    fn malformed_metadata_is_not_found() {
        let source = MemorySource::new().with_file("/books/vol1.json", "{ broken");
        let mut index = PanelIndex::new(source);
        assert!(matches!(
            index.load(Path::new("/books/vol1.cbz")),
            Err(CoreError::MetadataNotFound { .. })
        ));
        assert!(!index.is_cached(Path::new("/books/vol1.cbz")));
    }

    #[test]
    fn chapter_pages_resolve_through_chapter_files() {
        let source = MemorySource::new()
            .with_file(
                "/books/vol1.json",
                r#"{"reading_direction": "rtl", "chapters": [
                    {"name": "One", "json_file": "ch1.json", "total_pages": 2},
                    {"name": "Two", "json_file": "ch2.json", "total_pages": 3}
                ]}"#,
            )
            .with_file(
                "/books/ch1.json",
                r#"{"pages": [{"page": 1, "panels": [{"x":0,"y":0,"w":1,"h":1}]}]}"#,
            )
            .with_file(
                "/books/ch2.json",
                r#"{"reading_direction": "ltr", "pages": [{"page": 2, "panels": [
                    {"x":0,"y":0,"w":0.5,"h":1}, {"x":0.5,"y":0,"w":0.5,"h":1}
                ]}]}"#,
            );
        let mut index = PanelIndex::new(source);
        let data = index.load(Path::new("/books/vol1.cbz")).unwrap();

        assert_eq!(index.panels_for_page(&data, 1, None).len(), 1);
        assert!(index.panels_for_page(&data, 2, None).is_empty());
        // Global page 4 is local page 2 of chapter two.
        assert_eq!(index.panels_for_page(&data, 4, None).len(), 2);
        assert!(index.panels_for_page(&data, 6, None).is_empty());

        assert_eq!(index.reading_direction(&data, 1), ReadingDirection::Rtl);
        assert_eq!(index.reading_direction(&data, 4), ReadingDirection::Ltr);

        // Chapter files are read once each, plus the index itself.
        index.panels_for_page(&data, 5, None);
        assert_eq!(index.source().reads(), 3);
    }

    #[test]
    fn missing_chapter_file_yields_no_panels() {
        let source = MemorySource::new().with_file(
            "/books/vol1.json",
            r#"{"chapters": [{"name": "One", "json_file": "gone.json", "total_pages": 4}]}"#,
        );
        let mut index = PanelIndex::new(source);
        let data = index.load(Path::new("/books/vol1.cbz")).unwrap();
        assert!(index.panels_for_page(&data, 2, None).is_empty());
    }

    #[test]
    fn default_direction_is_rtl() {
        let source = MemorySource::new().with_file("/books/vol1.json", r#"{"panels": []}"#);
        let mut index = PanelIndex::new(source);
        let data = index.load(Path::new("/books/vol1.cbz")).unwrap();
        assert_eq!(index.reading_direction(&data, 1), ReadingDirection::Rtl);
    }
}

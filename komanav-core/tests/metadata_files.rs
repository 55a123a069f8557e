use std::fs;
use std::path::PathBuf;

use komanav_core::{CoreError, PanelIndex, ReadingDirection};

/// Scratch directory under the system temp dir, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("komanav_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create scratch dir");
        Self(dir)
    }

    fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.0.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.0.join(rel)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

const TWO_PAGES: &str = r#"{
  "reading_direction": "ltr",
  "total_pages": 2,
  "pages": [
    {"page": 1, "image": "001.jpg", "panels": [
      {"x": 0.05, "y": 0.05, "w": 0.9, "h": 0.4},
      {"x": 0.05, "y": 0.5, "w": 0.9, "h": 0.45}
    ]},
    {"page": 2, "image": "002.jpg", "panels": []}
  ]
}"#;

#[test]
fn loads_from_sibling_result_directory() {
    let scratch = Scratch::new("sibling");
    scratch.write("library/panel_result/vol1.json", TWO_PAGES);
    let document = scratch.write("library/series/vol1.cbz", "");

    let mut index = PanelIndex::from_fs();
    let data = index.load(&document).expect("metadata should resolve");
    assert_eq!(index.panels_for_page(&data, 1, None).len(), 2);
    assert_eq!(index.reading_direction(&data, 1), ReadingDirection::Ltr);
}

#[test]
fn missing_everywhere_is_not_found() {
    let scratch = Scratch::new("missing");
    let document = scratch.path("vol9.cbz");
    let mut index = PanelIndex::from_fs();
    assert!(matches!(
        index.load(&document),
        Err(CoreError::MetadataNotFound { .. })
    ));
}

#[test]
fn chapter_index_on_disk() {
    let scratch = Scratch::new("chapters");
    scratch.write(
        "manga/series.json",
        r#"{"reading_direction": "rtl", "chapters": [
            {"name": "Ch. 1", "json_file": "chapters/ch1.json", "total_pages": 10},
            {"name": "Ch. 2", "json_file": "chapters/ch2.json", "total_pages": 15}
        ]}"#,
    );
    scratch.write(
        "manga/chapters/ch2.json",
        r#"{"pages": [{"page": 2, "panels": [{"x": 0, "y": 0, "w": 1, "h": 1}]}]}"#,
    );

    let mut index = PanelIndex::from_fs();
    let data = index
        .load(&scratch.path("manga/series.cbz"))
        .expect("index should load");
    assert_eq!(index.panels_for_page(&data, 12, None).len(), 1);
    // Chapter one's file does not exist.
    assert!(index.panels_for_page(&data, 3, None).is_empty());
    // Beyond every chapter.
    assert!(index.panels_for_page(&data, 30, None).is_empty());
}

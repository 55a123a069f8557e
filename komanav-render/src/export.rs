//! PNG export of displayed panels with embedded metadata (tEXt chunks).

use std::io::BufWriter;
use std::path::Path;

use tracing::debug;

use komanav_core::{ReadingDirection, Rect};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;

/// Where a panel image came from, stored alongside the pixels.
#[derive(Debug, Clone)]
pub struct PanelExportMetadata {
    pub document: String,
    pub page: u32,
    /// 1-based panel index within `page`.
    pub panel_index: usize,
    /// Padded render rect in page pixels.
    pub rect: Rect,
    pub zoom: f64,
    pub reading_direction: ReadingDirection,
}

/// Write `buffer` as an RGBA PNG with panel metadata.
///
/// Uses the `png` crate directly so custom tEXt chunks can be added.
pub fn export_png(
    buffer: &RenderBuffer,
    path: &Path,
    metadata: &PanelExportMetadata,
) -> crate::Result<()> {
    let fail = |reason: String| RenderError::Export {
        path: path.to_path_buf(),
        reason,
    };

    let file =
        std::fs::File::create(path).map_err(|e| fail(format!("failed to create file: {e}")))?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, buffer.width, buffer.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Default);

    encoder
        .add_text_chunk("Software".to_string(), "Komanav".to_string())
        .map_err(|e| fail(format!("failed to add text chunk: {e}")))?;
    encoder
        .add_text_chunk("Description".to_string(), build_description(metadata))
        .map_err(|e| fail(format!("failed to add text chunk: {e}")))?;
    for (key, value) in build_metadata_pairs(metadata) {
        encoder
            .add_text_chunk(key.clone(), value)
            .map_err(|e| fail(format!("failed to add text chunk '{key}': {e}")))?;
    }

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| fail(format!("failed to write PNG header: {e}")))?;
    png_writer
        .write_image_data(&buffer.pixels)
        .map_err(|e| fail(format!("failed to write PNG image data: {e}")))?;

    debug!(
        page = metadata.page,
        index = metadata.panel_index,
        "Exported panel {}x{} to {}",
        buffer.width,
        buffer.height,
        path.display()
    );
    Ok(())
}

fn build_description(meta: &PanelExportMetadata) -> String {
    format!(
        "{} - Page {}, Panel {}, Zoom: {:.3}",
        meta.document, meta.page, meta.panel_index, meta.zoom
    )
}

fn build_metadata_pairs(meta: &PanelExportMetadata) -> Vec<(String, String)> {
    let direction = match meta.reading_direction {
        ReadingDirection::Ltr => "ltr",
        ReadingDirection::Rtl => "rtl",
    };
    vec![
        ("Komanav.Document".into(), meta.document.clone()),
        ("Komanav.Page".into(), meta.page.to_string()),
        ("Komanav.Panel".into(), meta.panel_index.to_string()),
        (
            "Komanav.Rect".into(),
            format!(
                "{:.1},{:.1},{:.1},{:.1}",
                meta.rect.x, meta.rect.y, meta.rect.w, meta.rect.h
            ),
        ),
        ("Komanav.Zoom".into(), format!("{}", meta.zoom)),
        ("Komanav.ReadingDirection".into(), direction.into()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn metadata() -> PanelExportMetadata {
        PanelExportMetadata {
            document: "vol1.cbz".into(),
            page: 3,
            panel_index: 2,
            rect: Rect {
                x: 83.8,
                y: 0.0,
                w: 858.2,
                h: 485.0,
            },
            zoom: 1.249,
            reading_direction: ReadingDirection::Rtl,
        }
    }

    #[test]
    fn export_creates_valid_png() {
        let buffer = RenderBuffer::filled(4, 4, [128, 128, 128, 255]);
        let dir = std::env::temp_dir().join("komanav_test_export");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("panel.png");
        export_png(&buffer, &path, &metadata()).expect("export should succeed");

        let mut file = std::fs::File::open(&path).expect("file should exist");
        let mut header = [0u8; 8];
        file.read_exact(&mut header).expect("should read header");
        assert_eq!(&header, b"\x89PNG\r\n\x1a\n", "valid PNG signature");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_embeds_text_chunks() {
        let buffer = RenderBuffer::new(2, 2);
        let dir = std::env::temp_dir().join("komanav_test_export_meta");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("panel_meta.png");
        export_png(&buffer, &path, &metadata()).expect("export should succeed");

        let decoder = png::Decoder::new(std::fs::File::open(&path).expect("file should exist"));
        let reader = decoder.read_info().expect("should read info");
        let texts = &reader.info().uncompressed_latin1_text;
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Software" && t.text == "Komanav"));
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Komanav.Panel" && t.text == "2"));
        assert!(texts
            .iter()
            .any(|t| t.keyword == "Komanav.ReadingDirection" && t.text == "rtl"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_path_is_an_export_error() {
        let buffer = RenderBuffer::new(1, 1);
        let path = std::env::temp_dir()
            .join("komanav_missing_dir_for_export")
            .join("nested")
            .join("panel.png");
        assert!(matches!(
            export_png(&buffer, &path, &metadata()),
            Err(RenderError::Export { .. })
        ));
    }
}

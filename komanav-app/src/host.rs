//! A document host backed by a directory of page images.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, warn};

use komanav_render::{DocumentHost, RenderBuffer, RenderRequest};

/// Pages are the image files of one directory, in filename order.
///
/// The most recently decoded page is kept so consecutive panels on the same
/// page decode it once.
pub struct ImageDirHost {
    pages: Vec<PathBuf>,
    current: u32,
    decoded: Option<(u32, RgbaImage)>,
}

impl ImageDirHost {
    /// List the page images in `dir`. `extensions` are matched
    /// case-insensitively.
    pub fn open(dir: &Path, extensions: &[String], start_page: u32) -> io::Result<Self> {
        let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_extension(path, extensions))
            .collect();
        pages.sort();

        if pages.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no page images in {}", dir.display()),
            ));
        }
        let current = start_page.clamp(1, pages.len() as u32);
        debug!(pages = pages.len(), current, "Opened image directory");
        Ok(Self {
            pages,
            current,
            decoded: None,
        })
    }

    fn page_path(&self, page: u32) -> Option<&PathBuf> {
        page.checked_sub(1).and_then(|i| self.pages.get(i as usize))
    }

    fn decoded_page(&mut self, page: u32) -> Option<&RgbaImage> {
        if self.decoded.as_ref().map(|(p, _)| *p) != Some(page) {
            let path = self.page_path(page)?;
            let image = match image::open(path) {
                Ok(image) => image.to_rgba8(),
                Err(e) => {
                    warn!(page, path = %path.display(), "Failed to decode page: {e}");
                    return None;
                }
            };
            self.decoded = Some((page, image));
        }
        self.decoded.as_ref().map(|(_, image)| image)
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

impl DocumentHost for ImageDirHost {
    fn current_page(&self) -> u32 {
        self.current
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Option<(u32, u32)> {
        if let Some((p, image)) = &self.decoded {
            if *p == page {
                return Some(image.dimensions());
            }
        }
        let path = self.page_path(page)?;
        image::image_dimensions(path)
            .map_err(|e| warn!(page, "Failed to read page size: {e}"))
            .ok()
    }

    fn page_name(&self, page: u32) -> Option<String> {
        self.page_path(page)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }

    fn turn_page(&mut self, delta: i32) -> bool {
        let target = self.current as i64 + delta as i64;
        if target < 1 || target > self.pages.len() as i64 {
            return false;
        }
        self.current = target as u32;
        true
    }

    fn render(&mut self, request: &RenderRequest) -> Option<RenderBuffer> {
        let page = self.decoded_page(request.page)?;
        let (page_w, page_h) = page.dimensions();

        let x0 = request.rect.x.floor().max(0.0) as u32;
        let y0 = request.rect.y.floor().max(0.0) as u32;
        let x1 = (request.rect.right().ceil() as u32).min(page_w);
        let y1 = (request.rect.bottom().ceil() as u32).min(page_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let region = imageops::crop_imm(page, x0, y0, x1 - x0, y1 - y0).to_image();
        let out_w = ((region.width() as f64 * request.zoom).round() as u32).max(1);
        let out_h = ((region.height() as f64 * request.zoom).round() as u32).max(1);
        let scaled = imageops::resize(&region, out_w, out_h, FilterType::Triangle);
        RenderBuffer::from_rgba(out_w, out_h, scaled.into_raw())
    }
}

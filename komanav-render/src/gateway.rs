use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use komanav_core::{apply_padding, to_pixel_rect, PaddingConfig, Panel, Rect};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::postprocess::post_process;

// ---------------------------------------------------------------------------
// Host interface
// ---------------------------------------------------------------------------

/// A render request issued to the host rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 1-based page number.
    pub page: u32,
    /// Region of the page, in page pixels at zoom 1.
    pub rect: Rect,
    pub zoom: f64,
    /// Always 0; panels are never rotated.
    pub rotation: u16,
    pub gamma: f64,
    pub dithering: bool,
}

/// The document engine hosting the panel viewer.
///
/// The host owns page rasterization and the page cursor. Page changes it
/// performs on request are expected to take effect within the viewer's
/// settle delay.
pub trait DocumentHost {
    /// Page currently showing, 1-based.
    fn current_page(&self) -> u32;

    fn page_count(&self) -> u32;

    /// Native size of a page in pixels, `None` if the page does not exist.
    fn page_size(&self, page: u32) -> Option<(u32, u32)>;

    /// Filename of a page's source image, used by legacy metadata lookups.
    fn page_name(&self, _page: u32) -> Option<String> {
        None
    }

    /// Move the page cursor by `delta` logical pages. Returns `false` when
    /// the move is impossible (first or last page).
    fn turn_page(&mut self, delta: i32) -> bool;

    /// Rasterize a region of a page. `None` signals failure.
    fn render(&mut self, request: &RenderRequest) -> Option<RenderBuffer>;

    /// Whether the host applies `RenderRequest::gamma` itself.
    fn applies_gamma(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Output settings for panel renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Target screen size; panels are zoomed to fit it.
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
    #[serde(default = "default_one")]
    pub gamma: f64,
    #[serde(default = "default_one")]
    pub contrast: f64,
    /// Document-level "invert colours" setting.
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub dithering: bool,
}

fn default_screen_width() -> u32 {
    1072
}
fn default_screen_height() -> u32 {
    1448
}
fn default_one() -> f64 {
    1.0
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            gamma: default_one(),
            contrast: default_one(),
            invert: false,
            dithering: false,
        }
    }
}

/// Zoom that fits `rect` inside a `screen_w × screen_h` screen.
pub fn fit_zoom(rect: &Rect, screen_w: u32, screen_h: u32) -> f64 {
    if rect.w <= 0.0 || rect.h <= 0.0 {
        return 1.0;
    }
    (screen_w as f64 / rect.w).min(screen_h as f64 / rect.h)
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Turns panels into host render requests and post-processes the result.
#[derive(Debug, Clone, Default)]
pub struct RenderGateway {
    settings: RenderSettings,
    padding: PaddingConfig,
}

impl RenderGateway {
    pub fn new(settings: RenderSettings, padding: PaddingConfig) -> Self {
        Self { settings, padding }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn padding(&self) -> &PaddingConfig {
        &self.padding
    }

    /// Padded pixel rect for `panel` on a page of the given size.
    pub fn panel_rect(&self, panel: &Panel, page_w: u32, page_h: u32) -> Rect {
        let rect = to_pixel_rect(panel, page_w, page_h);
        apply_padding(&rect, page_w, page_h, &self.padding)
    }

    /// Build the host request for `panel` on `page`.
    pub fn request_for<H: DocumentHost + ?Sized>(
        &self,
        host: &H,
        page: u32,
        panel: &Panel,
    ) -> crate::Result<RenderRequest> {
        let (page_w, page_h) = host
            .page_size(page)
            .ok_or(RenderError::PageUnavailable { page })?;
        let rect = self.panel_rect(panel, page_w, page_h);
        if rect.w <= 0.0 || rect.h <= 0.0 {
            return Err(RenderError::EmptyRect {
                page,
                width: rect.w,
                height: rect.h,
            });
        }
        Ok(RenderRequest {
            page,
            rect,
            zoom: fit_zoom(&rect, self.settings.screen_width, self.settings.screen_height),
            rotation: 0,
            gamma: self.settings.gamma,
            dithering: self.settings.dithering,
        })
    }

    /// Render `panel` through the host and apply post-processing.
    pub fn render_panel<H: DocumentHost + ?Sized>(
        &self,
        host: &mut H,
        page: u32,
        panel: &Panel,
    ) -> crate::Result<RenderBuffer> {
        let request = self.request_for(host, page, panel)?;
        debug!(
            page,
            x = request.rect.x,
            y = request.rect.y,
            w = request.rect.w,
            h = request.rect.h,
            zoom = request.zoom,
            "Rendering panel"
        );
        let Some(mut buffer) = host.render(&request) else {
            warn!(page, "Host returned no buffer");
            return Err(RenderError::RenderFailed { page });
        };
        post_process(
            &mut buffer,
            self.settings.contrast,
            self.settings.gamma,
            host.applies_gamma(),
            self.settings.invert,
        );
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubHost {
        size: Option<(u32, u32)>,
        fail: bool,
        requests: Vec<RenderRequest>,
    }

    impl StubHost {
        fn new() -> Self {
            Self {
                size: Some((1000, 1500)),
                fail: false,
                requests: Vec::new(),
            }
        }
    }

    impl DocumentHost for StubHost {
        fn current_page(&self) -> u32 {
            1
        }
        fn page_count(&self) -> u32 {
            1
        }
        fn page_size(&self, _page: u32) -> Option<(u32, u32)> {
            self.size
        }
        fn turn_page(&mut self, _delta: i32) -> bool {
            false
        }
        fn render(&mut self, request: &RenderRequest) -> Option<RenderBuffer> {
            self.requests.push(*request);
            (!self.fail).then(|| RenderBuffer::filled(4, 4, [100, 100, 100, 255]))
        }
    }

    #[test]
    fn fit_zoom_uses_limiting_axis() {
        let rect = Rect {
            x: 0.0,
            y: 0.0,
            w: 500.0,
            h: 250.0,
        };
        assert!((fit_zoom(&rect, 1000, 1000) - 2.0).abs() < 1e-12);
        assert!((fit_zoom(&rect, 1000, 250) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn request_carries_settings() {
        let settings = RenderSettings {
            gamma: 1.4,
            dithering: true,
            ..Default::default()
        };
        let gateway = RenderGateway::new(settings, PaddingConfig::default());
        let host = StubHost::new();
        let req = gateway
            .request_for(&host, 1, &Panel::new(0.084, 0.0, 0.857, 0.322))
            .unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.rotation, 0);
        assert!(req.dithering);
        assert!((req.gamma - 1.4).abs() < 1e-12);
        assert!(req.rect.is_within(1000, 1500));
        // Left padding is capped by the panel's distance from the page edge.
        assert!((req.rect.x - 83.8).abs() < 1e-9);
        assert_eq!(req.rect.y, 0.0);
    }

    #[test]
    fn render_applies_post_processing() {
        let settings = RenderSettings {
            invert: true,
            ..Default::default()
        };
        let gateway = RenderGateway::new(settings, PaddingConfig::default());
        let mut host = StubHost::new();
        let buf = gateway
            .render_panel(&mut host, 1, &Panel::new(0.1, 0.1, 0.5, 0.5))
            .unwrap();
        assert_eq!(buf.pixel(0, 0), Some([155, 155, 155, 255]));
        assert_eq!(host.requests.len(), 1);
    }

    #[test]
    fn host_failure_is_an_error() {
        let gateway = RenderGateway::default();
        let mut host = StubHost::new();
        host.fail = true;
        assert!(matches!(
            gateway.render_panel(&mut host, 1, &Panel::new(0.1, 0.1, 0.5, 0.5)),
            Err(RenderError::RenderFailed { page: 1 })
        ));
    }

    #[test]
    fn missing_page_is_an_error() {
        let gateway = RenderGateway::default();
        let mut host = StubHost::new();
        host.size = None;
        assert!(matches!(
            gateway.render_panel(&mut host, 9, &Panel::new(0.1, 0.1, 0.5, 0.5)),
            Err(RenderError::PageUnavailable { page: 9 })
        ));
        assert!(host.requests.is_empty());
    }

    #[test]
    fn zero_sized_panel_is_rejected() {
        let gateway = RenderGateway::default();
        let mut host = StubHost::new();
        assert!(matches!(
            gateway.render_panel(&mut host, 1, &Panel::new(0.5, 0.5, 0.0, 0.2)),
            Err(RenderError::EmptyRect { .. })
        ));
    }
}

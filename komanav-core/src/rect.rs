use serde::{Deserialize, Serialize};

use crate::panel::Panel;

/// Round half up (towards positive infinity), unlike `f64::round` which
/// rounds half away from zero.
#[inline]
pub fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

// ---------------------------------------------------------------------------
// Rectangles
// ---------------------------------------------------------------------------

/// An integer rectangle in page pixel space. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    /// Centre of the rectangle in pixel space.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Clip the rectangle to `[0, page_w] × [0, page_h]`.
    pub fn clamped(&self, page_w: u32, page_h: u32) -> Self {
        let (pw, ph) = (page_w as i64, page_h as i64);
        let x0 = self.x.clamp(0, pw);
        let y0 = self.y.clamp(0, ph);
        let x1 = (self.x + self.width).clamp(x0, pw);
        let y1 = (self.y + self.height).clamp(y0, ph);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

const EDGE_EPSILON: f64 = 1e-6;

/// A fractional rectangle in page pixel space, as sent to the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Whether the rectangle lies inside `[0, page_w] × [0, page_h]`,
    /// allowing for floating-point rounding at the edges.
    pub fn is_within(&self, page_w: u32, page_h: u32) -> bool {
        self.x >= -EDGE_EPSILON
            && self.y >= -EDGE_EPSILON
            && self.right() <= page_w as f64 + EDGE_EPSILON
            && self.bottom() <= page_h as f64 + EDGE_EPSILON
    }
}

impl From<PixelRect> for Rect {
    fn from(r: PixelRect) -> Self {
        Self {
            x: r.x as f64,
            y: r.y as f64,
            w: r.width as f64,
            h: r.height as f64,
        }
    }
}

/// Convert a normalized panel into an integer pixel rectangle.
///
/// The centre is computed first and the rectangle is placed around it after
/// quantizing the size, which keeps the rounded centre within half a pixel of
/// the exact one on both axes. The result is not clipped to the page.
pub fn to_pixel_rect(panel: &Panel, page_w: u32, page_h: u32) -> PixelRect {
    let (pw, ph) = (page_w as f64, page_h as f64);
    let cx = (panel.x + panel.w / 2.0) * pw;
    let cy = (panel.y + panel.h / 2.0) * ph;
    let width = round_half_up(panel.w * pw);
    let height = round_half_up(panel.h * ph);
    PixelRect {
        x: round_half_up(cx - width / 2.0) as i64,
        y: round_half_up(cy - height / 2.0) as i64,
        width: width as i64,
        height: height as i64,
    }
}

// ---------------------------------------------------------------------------
// Padding
// ---------------------------------------------------------------------------

/// Per-side padding in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Empirically tuned padding constants.
///
/// Aspect thresholds are percentages of `width / height`. The defaults are
/// the tuned values and should be changed only alongside visual checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    /// Base padding is `min(w, h) * base_ratio`, clamped to `[base_min, base_max]`.
    pub base_ratio: f64,
    pub base_min: f64,
    pub base_max: f64,

    /// Above this aspect a panel is a wide strip.
    pub wide_aspect: f64,
    pub wide_right: f64,

    /// Banner bucket: `banner_aspect ..= wide_aspect`.
    pub banner_aspect: f64,
    pub banner_min_width: f64,
    pub banner_max_height: f64,
    pub banner_right: f64,

    /// Landscape bucket: `landscape_aspect .. banner_aspect`.
    pub landscape_aspect: f64,
    pub mid_min_width: f64,
    pub mid_max_width: f64,
    pub mid_min_height: f64,
    pub mid_max_height: f64,
    pub mid_right: f64,

    /// Square-ish bucket: `square_aspect .. landscape_aspect`. Below is tall.
    pub square_aspect: f64,

    pub tall_min_height: f64,
    pub tall_wide_min_width: f64,
    pub tall_wide_right: f64,
    pub tall_narrow_right: f64,

    /// Right padding wherever no rule above applies.
    pub default_right: f64,

    pub left: f64,
    /// Left padding for mid-band panels whose aspect is within
    /// `mid_left_min_aspect ..= mid_left_max_aspect`.
    pub mid_left: f64,
    pub mid_left_min_aspect: f64,
    pub mid_left_max_aspect: f64,

    pub top: f64,
    pub bottom: f64,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            base_ratio: 0.05,
            base_min: 1.0,
            base_max: 2.0,
            wide_aspect: 300.0,
            wide_right: 5.0,
            banner_aspect: 200.0,
            banner_min_width: 600.0,
            banner_max_height: 250.0,
            banner_right: 3.0,
            landscape_aspect: 120.0,
            mid_min_width: 300.0,
            mid_max_width: 700.0,
            mid_min_height: 200.0,
            mid_max_height: 500.0,
            mid_right: 3.0,
            square_aspect: 80.0,
            tall_min_height: 800.0,
            tall_wide_min_width: 400.0,
            tall_wide_right: 1.0,
            tall_narrow_right: 2.0,
            default_right: 1.0,
            left: 0.2,
            mid_left: 0.6,
            mid_left_min_aspect: 130.0,
            mid_left_max_aspect: 160.0,
            top: 0.2,
            bottom: 2.0,
        }
    }
}

impl PaddingConfig {
    pub fn base_padding(&self, panel_w: f64, panel_h: f64) -> f64 {
        (panel_w.min(panel_h) * self.base_ratio)
            .max(self.base_min)
            .min(self.base_max)
    }

    fn in_mid_band(&self, panel_w: f64, panel_h: f64) -> bool {
        (self.mid_min_width..=self.mid_max_width).contains(&panel_w)
            && (self.mid_min_height..=self.mid_max_height).contains(&panel_h)
    }

    /// Unclamped right padding chosen by aspect bucket.
    pub fn right_padding(&self, panel_w: f64, panel_h: f64) -> f64 {
        let aspect = 100.0 * panel_w / panel_h;
        if aspect > self.wide_aspect {
            self.wide_right
        } else if aspect >= self.banner_aspect {
            if panel_w >= self.banner_min_width && panel_h <= self.banner_max_height {
                self.banner_right
            } else {
                self.default_right
            }
        } else if aspect >= self.landscape_aspect {
            if self.in_mid_band(panel_w, panel_h) {
                self.mid_right
            } else {
                self.default_right
            }
        } else if aspect >= self.square_aspect {
            self.default_right
        } else if panel_h >= self.tall_min_height {
            if panel_w >= self.tall_wide_min_width {
                self.tall_wide_right
            } else {
                self.tall_narrow_right
            }
        } else {
            self.base_padding(panel_w, panel_h)
        }
    }

    /// Unclamped left padding.
    pub fn left_padding(&self, panel_w: f64, panel_h: f64) -> f64 {
        let aspect = 100.0 * panel_w / panel_h;
        if (self.mid_left_min_aspect..=self.mid_left_max_aspect).contains(&aspect)
            && self.in_mid_band(panel_w, panel_h)
        {
            self.mid_left
        } else {
            self.left
        }
    }

    /// Padding for a rect already clipped to the page, limited on every side
    /// to the space left between the rect and the page edge.
    pub fn padding_for(&self, rect: &PixelRect, page_w: u32, page_h: u32) -> Padding {
        if rect.width <= 0 || rect.height <= 0 {
            return Padding::default();
        }
        let (w, h) = (rect.width as f64, rect.height as f64);
        let space_left = rect.x as f64;
        let space_right = (page_w as f64 - (rect.x + rect.width) as f64).max(0.0);
        let space_top = rect.y as f64;
        let space_bottom = (page_h as f64 - (rect.y + rect.height) as f64).max(0.0);

        Padding {
            left: self.left_padding(w, h).min(space_left).max(0.0),
            right: self.right_padding(w, h).min(space_right).max(0.0),
            top: self.top.min(space_top).max(0.0),
            bottom: self.bottom.min(space_bottom).max(0.0),
        }
    }
}

/// Clip `rect` to the page and grow it by the adaptive padding.
///
/// The returned rect is always inside `[0, page_w] × [0, page_h]`.
pub fn apply_padding(rect: &PixelRect, page_w: u32, page_h: u32, config: &PaddingConfig) -> Rect {
    let clipped = rect.clamped(page_w, page_h);
    let pad = config.padding_for(&clipped, page_w, page_h);
    let x0 = clipped.x as f64 - pad.left;
    let y0 = clipped.y as f64 - pad.top;
    let x1 = (clipped.x + clipped.width) as f64 + pad.right;
    let y1 = (clipped.y + clipped.height) as f64 + pad.bottom;
    Rect {
        x: x0,
        y: y0,
        w: x1 - x0,
        h: y1 - y0,
    }
}

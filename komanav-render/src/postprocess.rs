//! In-place adjustments applied to host output.
//!
//! Each pass touches only the colour channels; alpha is left alone.

use tracing::trace;

use crate::buffer::RenderBuffer;

/// Settings within this distance of 1.0 count as "no change".
pub const NEUTRAL_EPSILON: f64 = 1e-3;

#[inline]
pub fn is_neutral(value: f64) -> bool {
    (value - 1.0).abs() < NEUTRAL_EPSILON
}

fn map_rgb(buffer: &mut RenderBuffer, lut: &[u8; 256]) {
    for px in buffer.pixels.chunks_exact_mut(4) {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    }
}

fn build_lut(f: impl Fn(f64) -> f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = f(i as f64).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Scale each channel's distance from mid-grey by `contrast`.
pub fn apply_contrast(buffer: &mut RenderBuffer, contrast: f64) {
    let lut = build_lut(|v| (v - 128.0) * contrast + 128.0);
    map_rgb(buffer, &lut);
}

/// Gamma curve `out = 255 · (in / 255)^(1 / gamma)`; values above 1.0 lighten.
pub fn apply_gamma(buffer: &mut RenderBuffer, gamma: f64) {
    if gamma <= 0.0 || !gamma.is_finite() {
        return;
    }
    let exponent = 1.0 / gamma;
    let lut = build_lut(|v| 255.0 * (v / 255.0).powf(exponent));
    map_rgb(buffer, &lut);
}

pub fn invert(buffer: &mut RenderBuffer) {
    for px in buffer.pixels.chunks_exact_mut(4) {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}

/// Which passes actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    pub contrast: bool,
    pub gamma: bool,
    pub invert: bool,
}

/// Run the conditional passes in order: contrast, gamma, inversion.
///
/// Contrast and gamma are skipped when neutral; gamma is also skipped when
/// the host already applied it. Inversion runs only when `invert` is set.
pub fn post_process(
    buffer: &mut RenderBuffer,
    contrast: f64,
    gamma: f64,
    host_applied_gamma: bool,
    invert_colors: bool,
) -> Applied {
    let mut applied = Applied::default();
    if !is_neutral(contrast) {
        apply_contrast(buffer, contrast);
        applied.contrast = true;
    }
    if !is_neutral(gamma) && !host_applied_gamma {
        apply_gamma(buffer, gamma);
        applied.gamma = true;
    }
    if invert_colors {
        invert(buffer);
        applied.invert = true;
    }
    trace!(?applied, "Post-processed render");
    applied
}

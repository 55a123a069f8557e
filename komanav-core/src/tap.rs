use serde::{Deserialize, Serialize};

use crate::panel::ReadingDirection;

/// What a tap asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    Forward,
    Backward,
    Close,
}

/// Horizontal tap zones as fractions of the screen width.
///
/// `[0, left)` is the left zone, `[right, 1]` the right zone, and everything
/// in between closes the panel view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapZones {
    #[serde(default = "default_left")]
    pub left: f64,
    #[serde(default = "default_right")]
    pub right: f64,
}

fn default_left() -> f64 {
    0.3
}
fn default_right() -> f64 {
    0.7
}

impl Default for TapZones {
    fn default() -> Self {
        Self {
            left: default_left(),
            right: default_right(),
        }
    }
}

impl TapZones {
    /// Map a tap position to an action. The right zone advances in
    /// left-to-right mode; the mapping is mirrored for right-to-left.
    pub fn classify(&self, x_fraction: f64, direction: ReadingDirection) -> TapAction {
        let x = if x_fraction.is_nan() {
            0.5
        } else {
            x_fraction.clamp(0.0, 1.0)
        };
        let (left_action, right_action) = match direction {
            ReadingDirection::Ltr => (TapAction::Backward, TapAction::Forward),
            ReadingDirection::Rtl => (TapAction::Forward, TapAction::Backward),
        };
        if x < self.left {
            left_action
        } else if x >= self.right {
            right_action
        } else {
            TapAction::Close
        }
    }
}

/// Classify with the default zones.
pub fn classify(x_fraction: f64, direction: ReadingDirection) -> TapAction {
    TapZones::default().classify(x_fraction, direction)
}

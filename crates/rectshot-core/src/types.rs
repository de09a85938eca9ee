use serde::{Deserialize, Serialize};

/// Selections smaller than this (CSS pixels, either axis) are discarded.
pub const MIN_SELECTION_SIZE: f64 = 5.0;

/// Model used when the user has never picked one
pub const DEFAULT_MODEL: &str = "o1";

/// A selected region in page (CSS pixel) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CaptureRect {
    /// Normalize two corner points (in either order) into a rectangle.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    pub fn is_too_small(&self) -> bool {
        self.width < MIN_SELECTION_SIZE || self.height < MIN_SELECTION_SIZE
    }

    /// Scale into device pixels. A non-finite or non-positive ratio counts as 1.
    pub fn scaled(&self, device_pixel_ratio: f64) -> Self {
        let scale = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            x: self.x * scale,
            y: self.y * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// User preferences persisted alongside the credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Draw the selection outline (otherwise only the anchor dot is shown)
    pub show_rectangle: bool,
    /// Allow the `s` key to start a selection
    pub enable_select_shortcut: bool,
    /// Inference model name
    pub selected_model: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_rectangle: true,
            enable_select_shortcut: false,
            selected_model: DEFAULT_MODEL.into(),
        }
    }
}

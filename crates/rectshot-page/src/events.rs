//! Messages delivered to a page context by the host (popup, background
//! worker, keyboard shortcuts).

use rectshot_core::CaptureRect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundEvent {
    /// Begin (or, if one is active, cancel) a rectangle selection.
    #[serde(rename_all = "camelCase")]
    StartSelection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        show_rectangle: Option<bool>,
    },

    /// Full-viewport screenshot for the selected rectangle.
    #[serde(rename_all = "camelCase")]
    CaptureResult {
        data_url: String,
        rect: CaptureRect,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dpr: Option<f64>,
    },

    CaptureError {
        error: String,
    },

    UpdateSelectShortcut {
        #[serde(default)]
        enabled: bool,
    },

    #[serde(rename_all = "camelCase")]
    UpdateShowRectangle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        show_rectangle: Option<bool>,
    },

    UpdateModelSelection {
        model: String,
    },
}

//! rectshot-page: everything that lives for one page context
//!
//! ```text
//! InboundEvent ──▶ PageContext ──proceed()──▶ RequestPipeline
//!                      │                        ├─ UnlockFlow (rectshot-secrets)
//!                      │                        └─ VisionProvider (HTTPS)
//!                      └──────────────▶ ResponseHistory ──▶ HistoryView
//! ```
//!
//! The page context owns the session key (through its `UnlockFlow`), the
//! response history and the last cropped capture. Restarting the context
//! empties all three.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod capture;
pub mod context;
pub mod events;
pub mod history;
pub mod pipeline;
pub mod provider;

pub use capture::{crop_data_url, png_data_url, CaptureError, CroppedCapture};
pub use context::{Notifier, PageContext, ProceedOutcome, EMPTY_CAPTURE_MESSAGE};
pub use events::InboundEvent;
pub use history::{
    Direction, EntryId, EntryStatus, HistoryView, NullView, RenderState, ResponseEntry,
    ResponseHistory,
};
pub use pipeline::{RequestPipeline, LOADING_TEXT};
pub use provider::{OpenAiResponsesClient, ProviderError, ResponseShape, VisionProvider};

/// Lock a page-state mutex. A panic while holding it leaves plain data
/// behind, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

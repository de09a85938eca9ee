//! Page context: the per-page state that used to live in globals.
//!
//! One `PageContext` per page lifetime. It owns the preferences snapshot,
//! the selection state, the last cropped capture, the response history and
//! (through the pipeline) the session key.

use std::sync::{Arc, Mutex};

use rectshot_core::{CaptureRect, Preferences};
use rectshot_secrets::UnlockFlow;

use crate::capture::{crop_data_url, CroppedCapture};
use crate::events::InboundEvent;
use crate::history::{Direction, EntryId, HistoryView, RenderState, ResponseHistory};
use crate::lock;
use crate::pipeline::RequestPipeline;
use crate::provider::VisionProvider;

pub const EMPTY_CAPTURE_MESSAGE: &str = "No screenshot data available.";

/// Surfaces blocking messages to the user (`alert()` in a browser).
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Result of `PageContext::proceed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProceedOutcome {
    /// No capture to send; the user was alerted
    EmptyCapture,
    /// No credential; any message was already shown by the unlock flow
    Aborted,
    /// The request ran and its entry is settled
    Submitted(EntryId),
}

#[derive(Debug)]
struct PageState {
    prefs: Preferences,
    selection_active: bool,
    show_rectangle: bool,
    capture: Option<CroppedCapture>,
}

pub struct PageContext {
    state: Mutex<PageState>,
    history: Mutex<ResponseHistory>,
    pipeline: RequestPipeline,
    notifier: Arc<dyn Notifier>,
}

impl PageContext {
    pub fn new(
        prefs: Preferences,
        unlock: UnlockFlow,
        provider: Arc<dyn VisionProvider>,
        view: Arc<dyn HistoryView>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: Mutex::new(PageState {
                show_rectangle: prefs.show_rectangle,
                prefs,
                selection_active: false,
                capture: None,
            }),
            history: Mutex::new(ResponseHistory::new(view)),
            pipeline: RequestPipeline::new(unlock, provider),
            notifier,
        }
    }

    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::StartSelection { show_rectangle } => {
                let mut state = lock(&self.state);
                state.show_rectangle = show_rectangle.unwrap_or(true);
                state.selection_active = !state.selection_active;
                tracing::debug!(active = state.selection_active, "selection toggled");
            }
            InboundEvent::CaptureResult {
                data_url,
                rect,
                dpr,
            } => {
                lock(&self.state).selection_active = false;
                if rect.is_too_small() {
                    tracing::debug!(
                        width = rect.width,
                        height = rect.height,
                        "selection too small, discarded"
                    );
                    return;
                }
                self.accept_capture(data_url, rect, dpr.unwrap_or(1.0)).await;
            }
            InboundEvent::CaptureError { error } => {
                tracing::error!(%error, "screenshot capture failed");
                self.notifier
                    .alert(&format!("Failed to capture screenshot: {error}"));
            }
            InboundEvent::UpdateSelectShortcut { enabled } => {
                lock(&self.state).prefs.enable_select_shortcut = enabled;
            }
            InboundEvent::UpdateShowRectangle { show_rectangle } => {
                if let Some(show) = show_rectangle {
                    let mut state = lock(&self.state);
                    state.prefs.show_rectangle = show;
                    state.show_rectangle = show;
                }
            }
            InboundEvent::UpdateModelSelection { model } => {
                let model = model.trim();
                if !model.is_empty() {
                    lock(&self.state).prefs.selected_model = model.to_string();
                }
            }
        }
    }

    /// The `s` shortcut: start a selection with the remembered rectangle
    /// setting. Returns whether a selection was started.
    pub fn select_shortcut(&self) -> bool {
        let mut state = lock(&self.state);
        if !state.prefs.enable_select_shortcut || state.selection_active {
            return false;
        }
        state.show_rectangle = state.prefs.show_rectangle;
        state.selection_active = true;
        true
    }

    async fn accept_capture(&self, data_url: String, rect: CaptureRect, dpr: f64) {
        let cropped =
            tokio::task::spawn_blocking(move || crop_data_url(&data_url, &rect, dpr)).await;
        match cropped {
            Ok(Ok(capture)) => {
                lock(&self.state).capture = Some(capture);
            }
            Ok(Err(e)) => {
                tracing::warn!("could not crop capture: {e}");
                self.notifier
                    .alert(&format!("Failed to process screenshot: {e}"));
            }
            Err(e) => {
                tracing::error!("crop task failed: {e}");
                self.notifier
                    .alert(&format!("Failed to process screenshot: {e}"));
            }
        }
    }

    /// Send the last capture for explanation.
    ///
    /// The capture is kept when the credential cannot be resolved, so the
    /// user can retry; it is consumed once the request is dispatched.
    pub async fn proceed(&self) -> ProceedOutcome {
        if lock(&self.state).capture.is_none() {
            tracing::debug!("proceed requested with no pending capture");
            self.notifier.alert(EMPTY_CAPTURE_MESSAGE);
            return ProceedOutcome::EmptyCapture;
        }

        let api_key = match self.pipeline.authorize().await {
            Ok(key) => key,
            Err(e) => {
                if let Some(message) = e.user_message() {
                    self.notifier.alert(&message);
                }
                return ProceedOutcome::Aborted;
            }
        };

        let (capture, model) = {
            let mut state = lock(&self.state);
            (state.capture.take(), state.prefs.selected_model.clone())
        };
        let Some(capture) = capture else {
            // Cancelled while the passphrase prompt was open.
            self.notifier.alert(EMPTY_CAPTURE_MESSAGE);
            return ProceedOutcome::EmptyCapture;
        };

        let id = self
            .pipeline
            .dispatch(&self.history, &api_key, &model, &capture.data_url)
            .await;
        ProceedOutcome::Submitted(id)
    }

    /// Drop the pending capture.
    pub fn cancel(&self) {
        lock(&self.state).capture = None;
    }

    pub fn navigate(&self, direction: Direction) {
        lock(&self.history).navigate(direction);
    }

    pub fn dismiss_panel(&self) {
        lock(&self.history).dismiss();
    }

    pub fn render_state(&self) -> RenderState {
        lock(&self.history).render_state()
    }

    pub fn preferences(&self) -> Preferences {
        lock(&self.state).prefs.clone()
    }

    pub fn selection_active(&self) -> bool {
        lock(&self.state).selection_active
    }

    /// Whether the selection outline is drawn for the current selection.
    pub fn show_rectangle(&self) -> bool {
        lock(&self.state).show_rectangle
    }

    pub fn pending_capture(&self) -> Option<CroppedCapture> {
        lock(&self.state).capture.clone()
    }

    /// Page reload: forget the session key, history and pending capture.
    pub async fn restart(&self) {
        self.pipeline.unlock_flow().reset().await;
        lock(&self.history).clear();
        let mut state = lock(&self.state);
        state.capture = None;
        state.selection_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::png_data_url;
    use crate::history::{EntryStatus, NullView};
    use crate::provider::ProviderError;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use rectshot_secrets::{initialize, CredentialStore, ScriptedPrompter};
    use rectshot_storage::MemoryStore;
    use secrecy::SecretString;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn alerts(&self) -> Vec<String> {
            self.alerts.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }
    }

    struct ModelEcho;

    #[async_trait]
    impl VisionProvider for ModelEcho {
        async fn explain(
            &self,
            _api_key: &SecretString,
            model: &str,
            _image: &str,
        ) -> Result<String, ProviderError> {
            Ok(format!("answered by {model}"))
        }
    }

    fn viewport_url() -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(20, 20));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        png_data_url(&buf.into_inner())
    }

    fn capture_event() -> InboundEvent {
        InboundEvent::CaptureResult {
            data_url: viewport_url(),
            rect: CaptureRect {
                x: 2.0,
                y: 2.0,
                width: 6.0,
                height: 6.0,
            },
            dpr: Some(2.0),
        }
    }

    fn context(secret: Option<&str>) -> (Arc<RecordingNotifier>, PageContext) {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        if let Some(secret) = secret {
            initialize(&store, &SecretString::from(secret), None).unwrap();
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = PageContext::new(
            Preferences::default(),
            UnlockFlow::new(store, Arc::new(ScriptedPrompter::new([]))),
            Arc::new(ModelEcho),
            Arc::new(NullView),
            notifier.clone(),
        );
        (notifier, ctx)
    }

    #[tokio::test]
    async fn test_proceed_without_capture_alerts() {
        let (notifier, ctx) = context(Some("sk-abc"));
        assert_eq!(ctx.proceed().await, ProceedOutcome::EmptyCapture);
        assert_eq!(notifier.alerts(), vec![EMPTY_CAPTURE_MESSAGE.to_string()]);
        assert_eq!(ctx.render_state(), RenderState::Empty);
    }

    #[tokio::test]
    async fn test_capture_then_proceed_uses_selected_model() {
        let (notifier, ctx) = context(Some("sk-abc"));
        ctx.handle_event(InboundEvent::UpdateModelSelection {
            model: "gpt-5.1".into(),
        })
        .await;
        ctx.handle_event(capture_event()).await;

        let pending = ctx.pending_capture().unwrap();
        assert_eq!((pending.width, pending.height), (12, 12));

        assert!(matches!(ctx.proceed().await, ProceedOutcome::Submitted(_)));
        assert_eq!(
            ctx.render_state(),
            RenderState::Entry {
                position: 1,
                total: 1,
                status: EntryStatus::Done,
                text: "answered by gpt-5.1".into(),
            }
        );
        assert!(ctx.pending_capture().is_none());
        assert!(notifier.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_key_alerts_and_keeps_capture() {
        let (notifier, ctx) = context(None);
        ctx.handle_event(capture_event()).await;

        assert_eq!(ctx.proceed().await, ProceedOutcome::Aborted);
        assert!(notifier.alerts()[0].contains("No OpenAI API key"));
        assert!(ctx.pending_capture().is_some());
        assert_eq!(ctx.render_state(), RenderState::Empty);
    }

    #[tokio::test]
    async fn test_cancel_drops_capture() {
        let (_, ctx) = context(Some("sk-abc"));
        ctx.handle_event(capture_event()).await;
        ctx.cancel();
        assert_eq!(ctx.proceed().await, ProceedOutcome::EmptyCapture);
    }

    #[tokio::test]
    async fn test_capture_error_alerts() {
        let (notifier, ctx) = context(None);
        ctx.handle_event(InboundEvent::CaptureError {
            error: "Empty screenshot data".into(),
        })
        .await;
        assert_eq!(
            notifier.alerts(),
            vec!["Failed to capture screenshot: Empty screenshot data".to_string()]
        );
    }

    #[tokio::test]
    async fn test_start_selection_toggles_and_defaults_rectangle() {
        let (_, ctx) = context(None);
        ctx.handle_event(InboundEvent::StartSelection {
            show_rectangle: Some(false),
        })
        .await;
        assert!(ctx.selection_active());
        assert!(!ctx.show_rectangle());

        ctx.handle_event(InboundEvent::StartSelection {
            show_rectangle: None,
        })
        .await;
        assert!(!ctx.selection_active());
        assert!(ctx.show_rectangle());
    }

    #[tokio::test]
    async fn test_select_shortcut_requires_preference() {
        let (_, ctx) = context(None);
        assert!(!ctx.select_shortcut());

        ctx.handle_event(InboundEvent::UpdateSelectShortcut { enabled: true })
            .await;
        assert!(ctx.select_shortcut());
        assert!(!ctx.select_shortcut(), "already selecting");
    }

    #[tokio::test]
    async fn test_restart_empties_page_state() {
        let (_, ctx) = context(Some("sk-abc"));
        ctx.handle_event(capture_event()).await;
        ctx.proceed().await;
        ctx.dismiss_panel();

        ctx.restart().await;
        assert_eq!(ctx.render_state(), RenderState::Empty);
        assert!(ctx.pending_capture().is_none());
    }

    #[tokio::test]
    async fn test_tiny_selection_is_discarded() {
        let (notifier, ctx) = context(Some("sk-abc"));
        ctx.handle_event(InboundEvent::StartSelection {
            show_rectangle: None,
        })
        .await;
        ctx.handle_event(InboundEvent::CaptureResult {
            data_url: viewport_url(),
            rect: CaptureRect {
                x: 4.0,
                y: 4.0,
                width: 2.0,
                height: 2.0,
            },
            dpr: Some(1.0),
        })
        .await;

        assert!(ctx.pending_capture().is_none());
        assert!(!ctx.selection_active());
        assert!(notifier.alerts().is_empty());
    }
}

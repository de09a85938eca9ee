//! Request pipeline: credential → loading entry → provider call → settled
//! entry.

use std::sync::{Arc, Mutex};

use rectshot_secrets::{UnlockError, UnlockFlow};
use secrecy::SecretString;

use crate::history::{EntryId, EntryStatus, ResponseHistory};
use crate::lock;
use crate::provider::VisionProvider;

/// Placeholder text of a fresh entry.
pub const LOADING_TEXT: &str = "Loading...";

pub struct RequestPipeline {
    unlock: UnlockFlow,
    provider: Arc<dyn VisionProvider>,
}

impl RequestPipeline {
    pub fn new(unlock: UnlockFlow, provider: Arc<dyn VisionProvider>) -> Self {
        Self { unlock, provider }
    }

    pub fn unlock_flow(&self) -> &UnlockFlow {
        &self.unlock
    }

    /// Resolve the API key. Nothing is added to history on failure.
    pub async fn authorize(&self) -> Result<SecretString, UnlockError> {
        self.unlock.unlock().await
    }

    /// Append a loading entry, call the provider and settle the entry.
    ///
    /// Provider failures become `Error` entries; this never fails. The
    /// history lock is not held across the network call.
    pub async fn dispatch(
        &self,
        history: &Mutex<ResponseHistory>,
        api_key: &SecretString,
        model: &str,
        image_data_url: &str,
    ) -> EntryId {
        let id = lock(history).append(LOADING_TEXT);
        tracing::info!(entry = %id, model, "requesting explanation");

        let (text, status) = match self.provider.explain(api_key, model, image_data_url).await {
            Ok(answer) => (answer, EntryStatus::Done),
            Err(e) => {
                tracing::warn!(entry = %id, "inference request failed: {e}");
                (e.history_text(), EntryStatus::Error)
            }
        };

        lock(history).update(&id, Some(text), Some(status));
        tracing::debug!(entry = %id, %status, "history entry settled");
        id
    }

    /// `authorize` then `dispatch`.
    pub async fn submit(
        &self,
        history: &Mutex<ResponseHistory>,
        model: &str,
        image_data_url: &str,
    ) -> Result<EntryId, UnlockError> {
        let api_key = self.authorize().await?;
        Ok(self.dispatch(history, &api_key, model, image_data_url).await)
    }
}

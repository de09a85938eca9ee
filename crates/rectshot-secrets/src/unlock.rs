//! Credential unlock flow.
//!
//! ```text
//! Unresolved ──unlock()──▶ Resolving ──▶ Cached    (plain key, or envelope + correct passphrase)
//!                                    ├─▶ Declined  (prompt dismissed)
//!                                    └─▶ Failed    (not initialized, wrong passphrase, corrupt store)
//! ```
//!
//! `Declined` and `Failed` are not terminal: the next `unlock()` re-enters
//! `Resolving` and prompts again. Once `Cached`, `unlock()` returns the
//! session key with no I/O and no prompt.
//!
//! The session lock is held for the whole resolution, so concurrent callers
//! wait for one prompt/decrypt instead of prompting twice. The state itself
//! sits behind its own lock and can be read while a prompt is open.

use std::sync::{Arc, PoisonError};

use rectshot_crypto::CryptoError;
use rectshot_storage::{keys, StorageError};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::prompt::PassphrasePrompter;
use crate::session::SessionKeyCache;
use crate::store::{CredentialStore, StoredCredential};

pub const PASSPHRASE_PROMPT: &str = "Enter your decryption password for the OpenAI API key:";

pub const NOT_INITIALIZED_MESSAGE: &str = "No OpenAI API key is initialized.\n\n\
     Open the extension settings and click 'Initialize OpenAI API key' first.";

pub const DECRYPTION_FAILED_MESSAGE: &str =
    "Failed to decrypt API key. Check your password and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    Unresolved,
    Resolving,
    Cached,
    Declined,
    Failed,
}

#[derive(Debug, Error)]
pub enum UnlockError {
    #[error("no API key has been initialized")]
    NotInitialized,

    #[error("passphrase prompt dismissed")]
    UserDeclined,

    #[error("API key decryption failed")]
    Decryption,

    #[error("stored API key envelope is malformed: {0}")]
    MalformedEnvelope(String),

    #[error("credential storage error: {0}")]
    Storage(StorageError),

    #[error("unlock task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UnlockError {
    /// Copy to show the user, or `None` when the abort should stay silent.
    pub fn user_message(&self) -> Option<String> {
        match self {
            UnlockError::UserDeclined => None,
            UnlockError::NotInitialized => Some(NOT_INITIALIZED_MESSAGE.into()),
            UnlockError::Decryption | UnlockError::MalformedEnvelope(_) => {
                Some(DECRYPTION_FAILED_MESSAGE.into())
            }
            UnlockError::Storage(e) => Some(format!("Could not read the stored API key: {e}")),
            UnlockError::Task(_) => Some(DECRYPTION_FAILED_MESSAGE.into()),
        }
    }
}

impl From<CryptoError> for UnlockError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::MalformedEnvelope(reason) => UnlockError::MalformedEnvelope(reason),
            CryptoError::Decryption | CryptoError::Encryption(_) => UnlockError::Decryption,
        }
    }
}

impl From<StorageError> for UnlockError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidValue { key, reason } if key == keys::OPENAI_KEY_ENC => {
                UnlockError::MalformedEnvelope(reason)
            }
            other => UnlockError::Storage(other),
        }
    }
}

/// Resolves the API key for one page context.
pub struct UnlockFlow {
    store: CredentialStore,
    prompter: Arc<dyn PassphrasePrompter>,
    session: Mutex<SessionKeyCache>,
    state: std::sync::Mutex<UnlockState>,
}

impl UnlockFlow {
    pub fn new(store: CredentialStore, prompter: Arc<dyn PassphrasePrompter>) -> Self {
        Self {
            store,
            prompter,
            session: Mutex::new(SessionKeyCache::new()),
            state: std::sync::Mutex::new(UnlockState::Unresolved),
        }
    }

    /// Current state. Never waits on an in-flight resolution.
    pub fn state(&self) -> UnlockState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: UnlockState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Return the API key, resolving it on first use.
    pub async fn unlock(&self) -> Result<SecretString, UnlockError> {
        let mut cache = self.session.lock().await;
        if let Some(secret) = cache.get() {
            return Ok(secret.clone());
        }

        self.set_state(UnlockState::Resolving);
        let result = self.resolve().await;

        let next = match &result {
            Ok(secret) => {
                cache.fill(secret.clone());
                tracing::debug!("API key cached for this session");
                UnlockState::Cached
            }
            Err(UnlockError::UserDeclined) => {
                tracing::debug!("passphrase prompt declined");
                UnlockState::Declined
            }
            Err(UnlockError::MalformedEnvelope(reason)) => {
                tracing::warn!(%reason, "stored API key envelope is malformed");
                UnlockState::Failed
            }
            Err(e) => {
                tracing::warn!("API key unlock failed: {e}");
                UnlockState::Failed
            }
        };
        self.set_state(next);
        result
    }

    /// Forget the session key and start over (page-context restart).
    pub async fn reset(&self) {
        let mut cache = self.session.lock().await;
        cache.clear();
        self.set_state(UnlockState::Unresolved);
    }

    async fn resolve(&self) -> Result<SecretString, UnlockError> {
        match self.store.load()? {
            StoredCredential::Uninitialized => Err(UnlockError::NotInitialized),
            StoredCredential::Plain(secret) => Ok(secret),
            StoredCredential::Encrypted(envelope) => {
                // Reject a corrupt envelope before bothering the user.
                envelope.decode()?;

                let prompter = Arc::clone(&self.prompter);
                let passphrase = tokio::task::spawn_blocking(move || {
                    prompter.prompt_passphrase(PASSPHRASE_PROMPT)
                })
                .await?
                .filter(|p| !p.expose_secret().is_empty())
                .ok_or(UnlockError::UserDeclined)?;

                let secret = tokio::task::spawn_blocking(move || {
                    rectshot_crypto::decrypt(&envelope, &passphrase)
                })
                .await??;
                Ok(secret)
            }
        }
    }
}

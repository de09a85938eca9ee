//! Credential store adapter: the API key in one of its two persisted forms.

use std::sync::Arc;

use rectshot_crypto::EncryptedEnvelope;
use rectshot_storage::{keys, KeyValueStore, StorageError, StorageResult, WriteBatch};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// What the writer persists
#[derive(Debug, Clone)]
pub enum CredentialRecord {
    Plain(SecretString),
    Encrypted(EncryptedEnvelope),
}

/// What the reader finds
#[derive(Debug, Clone)]
pub enum StoredCredential {
    /// Nothing stored yet (not an error)
    Uninitialized,
    Plain(SecretString),
    Encrypted(EncryptedEnvelope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    Uninitialized,
    Plain,
    Encrypted,
}

impl StoredCredential {
    pub fn mode(&self) -> CredentialMode {
        match self {
            StoredCredential::Uninitialized => CredentialMode::Uninitialized,
            StoredCredential::Plain(_) => CredentialMode::Plain,
            StoredCredential::Encrypted(_) => CredentialMode::Encrypted,
        }
    }
}

impl std::fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialMode::Uninitialized => write!(f, "uninitialized"),
            CredentialMode::Plain => write!(f, "plain (no password)"),
            CredentialMode::Encrypted => write!(f, "encrypted"),
        }
    }
}

/// Reads and writes the credential under its fixed storage keys.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Persist one form and clear the other in the same batch.
    pub fn save(&self, record: &CredentialRecord) -> StorageResult<()> {
        let batch = match record {
            CredentialRecord::Plain(secret) => WriteBatch::new()
                .set(
                    keys::OPENAI_API_KEY_PLAIN,
                    Value::String(secret.expose_secret().to_string()),
                )
                .remove(keys::OPENAI_KEY_ENC),
            CredentialRecord::Encrypted(envelope) => WriteBatch::new()
                .set(keys::OPENAI_KEY_ENC, serde_json::to_value(envelope)?)
                .remove(keys::OPENAI_API_KEY_PLAIN),
        };
        self.kv.apply(batch)?;

        tracing::info!(
            mode = %match record {
                CredentialRecord::Plain(_) => CredentialMode::Plain,
                CredentialRecord::Encrypted(_) => CredentialMode::Encrypted,
            },
            "saved API key"
        );
        Ok(())
    }

    /// Load whichever form is present.
    ///
    /// A plain key wins if a foreign writer left both forms behind. An
    /// envelope that does not have exactly the three string fields is an
    /// `InvalidValue` error under `openaiKeyEnc`.
    pub fn load(&self) -> StorageResult<StoredCredential> {
        let plain = match self.kv.get(keys::OPENAI_API_KEY_PLAIN)? {
            Some(Value::String(s)) if !s.is_empty() => Some(SecretString::from(s)),
            Some(Value::String(_)) | None => None,
            Some(_) => {
                return Err(StorageError::InvalidValue {
                    key: keys::OPENAI_API_KEY_PLAIN.into(),
                    reason: "expected a string".into(),
                })
            }
        };
        let envelope = self.kv.get(keys::OPENAI_KEY_ENC)?;

        match (plain, envelope) {
            (Some(secret), envelope) => {
                if envelope.is_some() {
                    tracing::warn!("both plain and encrypted API keys are stored; using the plain key");
                }
                Ok(StoredCredential::Plain(secret))
            }
            (None, Some(value)) => serde_json::from_value::<EncryptedEnvelope>(value)
                .map(StoredCredential::Encrypted)
                .map_err(|e| StorageError::InvalidValue {
                    key: keys::OPENAI_KEY_ENC.into(),
                    reason: e.to_string(),
                }),
            (None, None) => Ok(StoredCredential::Uninitialized),
        }
    }

    /// Remove both forms.
    pub fn clear(&self) -> StorageResult<()> {
        self.kv.apply(
            WriteBatch::new()
                .remove(keys::OPENAI_KEY_ENC)
                .remove(keys::OPENAI_API_KEY_PLAIN),
        )?;
        tracing::info!("cleared stored API key");
        Ok(())
    }
}

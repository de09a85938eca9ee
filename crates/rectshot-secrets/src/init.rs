//! Writer side of the credential: store a freshly entered API key.

use rectshot_crypto::CryptoError;
use rectshot_storage::StorageError;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::store::{CredentialMode, CredentialRecord, CredentialStore};

/// Shown before a key is saved without a passphrase.
pub const PLAINTEXT_WARNING: &str = "No password chosen. The API key will be stored only \
     locally on this device, unencrypted. Anyone with access to this browser profile can read it.";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("no API key entered")]
    EmptySecret,

    #[error("encrypting API key: {0}")]
    Crypto(#[from] CryptoError),

    #[error("saving API key: {0}")]
    Storage(#[from] StorageError),
}

/// Save `secret`, encrypted under `passphrase` when one is given.
///
/// The secret is trimmed first. An empty or absent passphrase selects plain
/// storage; either path clears the other stored form.
pub fn initialize(
    store: &CredentialStore,
    secret: &SecretString,
    passphrase: Option<&SecretString>,
) -> Result<CredentialMode, InitError> {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return Err(InitError::EmptySecret);
    }
    let secret = SecretString::from(trimmed);

    match passphrase.filter(|p| !p.expose_secret().is_empty()) {
        Some(passphrase) => {
            let envelope = rectshot_crypto::encrypt(&secret, passphrase)?;
            store.save(&CredentialRecord::Encrypted(envelope))?;
            Ok(CredentialMode::Encrypted)
        }
        None => {
            tracing::warn!("storing API key without a passphrase");
            store.save(&CredentialRecord::Plain(secret))?;
            Ok(CredentialMode::Plain)
        }
    }
}

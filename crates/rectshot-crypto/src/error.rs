use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The stored envelope could not be transport-decoded or has the wrong
    /// field sizes. Raised before any cryptographic operation.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication tag did not verify (wrong passphrase, corruption, or tampering)
    #[error("decryption failed: wrong passphrase or corrupted data")]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),
}

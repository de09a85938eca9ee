//! rectshot-crypto: at-rest protection for the inference API key
//!
//! Scheme (fixed; stored credentials depend on every parameter):
//! ```text
//! key   = PBKDF2-HMAC-SHA256(passphrase, salt[16], 100_000 iterations) -> 256-bit
//! blob  = AES-256-GCM(key, iv[12], utf8(secret))  (ciphertext || 16-byte tag)
//! store = { ciphertext: b64(blob), iv: b64(iv), salt: b64(salt) }
//! ```
//!
//! `salt` and `iv` are drawn fresh from the OS RNG on every encryption.
//! A failed tag check is reported as a single `Decryption` error whether the
//! passphrase was wrong or the data was tampered with.

pub mod envelope;
pub mod error;
pub mod kdf;

pub use envelope::{decrypt, encrypt, EncryptedEnvelope, RawEnvelope};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, EnvelopeKey};

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

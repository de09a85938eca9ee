//! AES-256-GCM envelope for a single short secret
//!
//! Stored form (JSON, every field standard base64 with padding):
//! ```text
//! { "ciphertext": b64(ct || tag[16]), "iv": b64(nonce[12]), "salt": b64(salt[16]) }
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::derive_key;
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Transport-encoded envelope, as persisted under `openaiKeyEnc`.
///
/// All three fields travel together; a partially populated envelope fails
/// to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
}

/// Binary envelope with fixed-size salt and nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnvelope {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; NONCE_SIZE],
    /// Ciphertext with the GCM tag appended
    pub ciphertext: Vec<u8>,
}

impl RawEnvelope {
    pub fn encode(&self) -> EncryptedEnvelope {
        EncryptedEnvelope {
            ciphertext: B64.encode(&self.ciphertext),
            iv: B64.encode(self.iv),
            salt: B64.encode(self.salt),
        }
    }
}

impl EncryptedEnvelope {
    /// Transport-decode and size-check every field.
    pub fn decode(&self) -> CryptoResult<RawEnvelope> {
        let salt = decode_fixed::<SALT_SIZE>("salt", &self.salt)?;
        let iv = decode_fixed::<NONCE_SIZE>("iv", &self.iv)?;
        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;

        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::MalformedEnvelope(format!(
                "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
                ciphertext.len()
            )));
        }

        Ok(RawEnvelope {
            salt,
            iv,
            ciphertext,
        })
    }
}

fn decode_field(name: &str, value: &str) -> CryptoResult<Vec<u8>> {
    B64.decode(value)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("base64 decode {name}: {e}")))
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> CryptoResult<[u8; N]> {
    let bytes = decode_field(name, value)?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::MalformedEnvelope(format!(
            "{name} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Encrypt `secret` under a key derived from `passphrase`.
///
/// Salt and nonce are fresh OS randomness on every call, so encrypting the
/// same input twice yields unrelated envelopes.
pub fn encrypt(secret: &SecretString, passphrase: &SecretString) -> CryptoResult<EncryptedEnvelope> {
    let mut salt = [0u8; SALT_SIZE];
    let mut iv = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            secret.expose_secret().as_bytes(),
        )
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(RawEnvelope {
        salt,
        iv,
        ciphertext,
    }
    .encode())
}

/// Decrypt an envelope with `passphrase`.
///
/// Malformed transport encoding is rejected before the KDF runs. Any tag
/// failure is reported as `CryptoError::Decryption`.
pub fn decrypt(envelope: &EncryptedEnvelope, passphrase: &SecretString) -> CryptoResult<SecretString> {
    let raw = envelope.decode()?;

    let key = derive_key(passphrase, &raw.salt);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&raw.iv), raw.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption)?;

    match String::from_utf8(plaintext) {
        Ok(secret) => Ok(SecretString::from(secret)),
        Err(e) => {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            Err(CryptoError::MalformedEnvelope(
                "decrypted secret is not valid UTF-8".into(),
            ))
        }
    }
}

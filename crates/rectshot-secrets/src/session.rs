//! Per-page-context holder of the decrypted API key.
//!
//! Created empty, filled once on the first successful unlock, dropped with
//! the page context. There is no expiry and nothing is persisted.

use secrecy::SecretString;

#[derive(Debug, Default)]
pub struct SessionKeyCache {
    secret: Option<SecretString>,
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&SecretString> {
        self.secret.as_ref()
    }

    pub fn fill(&mut self, secret: SecretString) {
        self.secret = Some(secret);
    }

    pub fn is_filled(&self) -> bool {
        self.secret.is_some()
    }

    /// Drop the cached key (page-context restart).
    pub fn clear(&mut self) {
        self.secret = None;
    }
}

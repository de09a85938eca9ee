//! rectshot-secrets: the inference API key at rest and in session
//!
//! Storage forms (exactly one present, enforced by the writer):
//!   - `openaiKeyEnc`       AES-GCM envelope, unlocked with a passphrase
//!   - `openaiApiKeyPlain`  stored as-is, no passphrase
//!
//! Unlock order: session cache → plain key → envelope (prompt + decrypt).
//! The decrypted key lives in the session cache for the life of the page
//! context and is never written back to storage.

pub mod init;
pub mod prompt;
pub mod session;
pub mod store;
pub mod unlock;

pub use init::{initialize, InitError, PLAINTEXT_WARNING};
pub use prompt::{PassphrasePrompter, ScriptedPrompter, TerminalPrompter};
pub use session::SessionKeyCache;
pub use store::{CredentialMode, CredentialRecord, CredentialStore, StoredCredential};
pub use unlock::{UnlockError, UnlockFlow, UnlockState};

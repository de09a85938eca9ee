//! rectshot-storage: durable key-value storage shared by the credential
//! adapter and the user preferences
//!
//! The store mirrors `chrome.storage.local` semantics: string keys, JSON
//! values, a missing key and a JSON `null` are both "absent".

pub mod error;
pub mod kv;
pub mod prefs;

pub use error::{StorageError, StorageResult};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, WriteBatch};
pub use prefs::{load_preferences, save_preferences};

/// Well-known storage keys
pub mod keys {
    /// AES-GCM envelope of the API key (`{ciphertext, iv, salt}`)
    pub const OPENAI_KEY_ENC: &str = "openaiKeyEnc";
    /// API key stored without a passphrase
    pub const OPENAI_API_KEY_PLAIN: &str = "openaiApiKeyPlain";
    pub const SHOW_RECTANGLE: &str = "showRectangle";
    pub const ENABLE_SELECT_SHORTCUT: &str = "enableSelectShortcut";
    pub const SELECTED_MODEL: &str = "selectedModel";
}

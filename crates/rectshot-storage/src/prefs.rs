//! User preferences (`showRectangle`, `enableSelectShortcut`, `selectedModel`).
//!
//! Each key falls back to its default independently when it is absent or
//! holds a value of the wrong JSON type.

use rectshot_core::Preferences;
use serde_json::Value;

use crate::error::StorageResult;
use crate::keys;
use crate::kv::{KeyValueStore, WriteBatch};

pub fn load_preferences(store: &dyn KeyValueStore) -> StorageResult<Preferences> {
    let defaults = Preferences::default();

    let show_rectangle = match store.get(keys::SHOW_RECTANGLE)? {
        Some(Value::Bool(b)) => b,
        _ => defaults.show_rectangle,
    };
    let enable_select_shortcut = match store.get(keys::ENABLE_SELECT_SHORTCUT)? {
        Some(Value::Bool(b)) => b,
        _ => defaults.enable_select_shortcut,
    };
    let selected_model = match store.get(keys::SELECTED_MODEL)? {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => defaults.selected_model,
    };

    Ok(Preferences {
        show_rectangle,
        enable_select_shortcut,
        selected_model,
    })
}

pub fn save_preferences(store: &dyn KeyValueStore, prefs: &Preferences) -> StorageResult<()> {
    store.apply(
        WriteBatch::new()
            .set(keys::SHOW_RECTANGLE, Value::Bool(prefs.show_rectangle))
            .set(
                keys::ENABLE_SELECT_SHORTCUT,
                Value::Bool(prefs.enable_select_shortcut),
            )
            .set(
                keys::SELECTED_MODEL,
                Value::String(prefs.selected_model.clone()),
            ),
    )?;
    tracing::debug!(model = %prefs.selected_model, "saved preferences");
    Ok(())
}

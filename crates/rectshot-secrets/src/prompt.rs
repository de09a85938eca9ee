//! Passphrase prompters.
//!
//! `None` means the user declined (dismissed the prompt or entered nothing).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};

/// Asks the user for the passphrase protecting the stored API key.
///
/// Implementations may block; the unlock flow calls them off the async
/// executor.
pub trait PassphrasePrompter: Send + Sync {
    fn prompt_passphrase(&self, message: &str) -> Option<SecretString>;
}

/// Hidden-input prompt on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl PassphrasePrompter for TerminalPrompter {
    fn prompt_passphrase(&self, message: &str) -> Option<SecretString> {
        match rpassword::prompt_password(format!("{message} ")) {
            Ok(input) if !input.is_empty() => Some(SecretString::from(input)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("passphrase prompt failed: {e}");
                None
            }
        }
    }
}

/// Replays a fixed queue of answers, then an optional fallback forever.
///
/// Used for non-interactive unlocks (`RECTSHOT_PASSPHRASE`) and in tests.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<SecretString>>>,
    fallback: Option<SecretString>,
    prompted: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn new<'a>(answers: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(SecretString::from))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Answer every prompt with the same passphrase.
    pub fn always(passphrase: SecretString) -> Self {
        Self {
            fallback: Some(passphrase),
            ..Self::default()
        }
    }

    /// How many times a passphrase has been requested.
    pub fn times_prompted(&self) -> usize {
        self.prompted.load(Ordering::SeqCst)
    }
}

impl PassphrasePrompter for ScriptedPrompter {
    fn prompt_passphrase(&self, _message: &str) -> Option<SecretString> {
        self.prompted.fetch_add(1, Ordering::SeqCst);
        let next = match self.answers.lock() {
            Ok(mut answers) => answers.pop_front(),
            Err(_) => None,
        };
        next.unwrap_or_else(|| self.fallback.clone())
            .filter(|p| !p.expose_secret().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_answers_in_order_then_declines() {
        let prompter = ScriptedPrompter::new([Some("wrong"), None, Some("hunter2")]);

        let first = prompter.prompt_passphrase("?");
        assert_eq!(first.as_ref().map(|p| p.expose_secret()), Some("wrong"));
        assert!(prompter.prompt_passphrase("?").is_none());
        let third = prompter.prompt_passphrase("?");
        assert_eq!(third.as_ref().map(|p| p.expose_secret()), Some("hunter2"));
        assert!(prompter.prompt_passphrase("?").is_none());

        assert_eq!(prompter.times_prompted(), 4);
    }

    #[test]
    fn test_always_repeats() {
        let prompter = ScriptedPrompter::always(SecretString::from("pw"));
        for _ in 0..3 {
            assert!(prompter.prompt_passphrase("?").is_some());
        }
    }

    #[test]
    fn test_empty_answer_counts_as_declined() {
        let prompter = ScriptedPrompter::new([Some("")]);
        assert!(prompter.prompt_passphrase("?").is_none());
    }
}

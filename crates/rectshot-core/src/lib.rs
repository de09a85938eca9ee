pub mod config;
pub mod error;
pub mod types;

pub use config::RectshotConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::{CaptureRect, Preferences};

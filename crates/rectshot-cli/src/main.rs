//! rectshot: RectShot command-line client
//!
//! Commands:
//!   key init [--plaintext]   - store the OpenAI API key (encrypted unless --plaintext)
//!   key status               - show how the key is stored, without unlocking it
//!   key verify               - unlock the key once (prompts for the passphrase)
//!   key clear                - remove the stored key
//!   settings show|set        - view or change the selection preferences
//!   config show              - display current configuration
//!   explain <png> --rect ... - crop a screenshot and ask the model about it

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rectshot_core::types::MIN_SELECTION_SIZE;
use rectshot_core::{CaptureRect, RectshotConfig};
use rectshot_page::{
    png_data_url, EntryStatus, HistoryView, InboundEvent, Notifier, OpenAiResponsesClient,
    PageContext, ProceedOutcome, RenderState,
};
use rectshot_secrets::{
    initialize, CredentialMode, CredentialStore, PassphrasePrompter, ScriptedPrompter,
    TerminalPrompter, UnlockFlow, PLAINTEXT_WARNING,
};
use rectshot_storage::{load_preferences, save_preferences, JsonFileStore};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rectshot",
    version,
    about = "RectShot screenshot explainer",
    long_about = "rectshot: manage the protected OpenAI API key, selection settings, and one-shot explanations"
)]
struct Cli {
    /// Path to rectshot.toml (default: <config dir>/rectshot/rectshot.toml)
    #[arg(long, short = 'c', env = "RECTSHOT_CONFIG")]
    config: Option<PathBuf>,

    /// Key-value storage file (overrides config)
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error; overrides config)
    #[arg(long, env = "RECTSHOT_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "RECTSHOT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Passphrase for non-interactive use
    #[arg(long, env = "RECTSHOT_PASSPHRASE", hide = true, hide_env_values = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// OpenAI API key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Selection and model preferences
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Crop a full-viewport PNG and ask the model to explain the region
    Explain {
        /// Full-viewport screenshot (PNG)
        image: PathBuf,
        /// Selected region in CSS pixels: x,y,width,height
        #[arg(long, value_parser = parse_rect)]
        rect: CaptureRect,
        /// Device pixel ratio of the screenshot
        #[arg(long, default_value_t = 1.0)]
        dpr: f64,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Store the API key, encrypted under a passphrase
    Init {
        /// Store without a passphrase (unencrypted, local only)
        #[arg(long)]
        plaintext: bool,
    },
    /// Show how the key is stored
    Status,
    /// Unlock the key once to check the passphrase
    Verify,
    /// Remove the stored key
    Clear,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the stored preferences
    Show,
    /// Change one or more preferences
    Set {
        /// Draw the selection rectangle
        #[arg(long)]
        show_rectangle: Option<bool>,
        /// Enable the `s` shortcut to start a selection
        #[arg(long)]
        select_shortcut: Option<bool>,
        /// Model used for explanations
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = RectshotConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    if let Some(storage) = &cli.storage {
        config.storage.path = storage.clone();
    }

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        storage = %config.storage.path.display(),
        "rectshot starting"
    );

    let passphrase = cli.passphrase.map(SecretString::from);

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::Init { plaintext } => cmd_key_init(&config, plaintext, passphrase),
            KeyAction::Status => cmd_key_status(&config),
            KeyAction::Verify => cmd_key_verify(&config, passphrase).await,
            KeyAction::Clear => cmd_key_clear(&config),
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => cmd_settings_show(&config),
            SettingsAction::Set {
                show_rectangle,
                select_shortcut,
                model,
            } => cmd_settings_set(&config, show_rectangle, select_shortcut, model),
        },
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
        Commands::Explain { image, rect, dpr } => {
            cmd_explain(&config, &image, rect, dpr, passphrase).await
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rectshot")
        .join("rectshot.toml")
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn parse_rect(s: &str) -> Result<CaptureRect, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in rect: {e}"))?;
    let [x, y, width, height] = parts.as_slice() else {
        return Err("expected x,y,width,height".into());
    };
    if !parts.iter().all(|v| v.is_finite()) {
        return Err("rect values must be finite".into());
    }
    // A negative width or height selects towards the origin.
    let rect = CaptureRect::from_corners(*x, *y, x + width, y + height);
    if rect.is_too_small() {
        return Err(format!(
            "selection must be at least {MIN_SELECTION_SIZE}x{MIN_SELECTION_SIZE} pixels"
        ));
    }
    Ok(rect)
}

fn open_store(config: &RectshotConfig) -> Result<Arc<JsonFileStore>> {
    let store = JsonFileStore::open(&config.storage.path)
        .with_context(|| format!("opening storage {}", config.storage.path.display()))?;
    Ok(Arc::new(store))
}

fn prompter(passphrase: Option<SecretString>) -> Arc<dyn PassphrasePrompter> {
    match passphrase {
        Some(p) => Arc::new(ScriptedPrompter::always(p)),
        None => Arc::new(TerminalPrompter),
    }
}

// ── `rectshot key ...` ────────────────────────────────────────────────────────

fn cmd_key_init(
    config: &RectshotConfig,
    plaintext: bool,
    passphrase: Option<SecretString>,
) -> Result<()> {
    let secret = rpassword::prompt_password("Enter your OpenAI API key: ")
        .context("reading API key")?;
    if secret.trim().is_empty() {
        println!("Initialization cancelled.");
        return Ok(());
    }

    let passphrase = if plaintext {
        None
    } else {
        match passphrase {
            Some(p) => Some(p),
            None => rpassword::prompt_password(
                "Choose a decryption password (you must remember this to use the key later; leave empty to store the key unencrypted): ",
            )
            .map(SecretString::from)
            .map(Some)
            .context("reading passphrase")?,
        }
    };

    let store = CredentialStore::new(open_store(config)?);
    let mode = save_api_key(
        &store,
        &SecretString::from(secret),
        passphrase.as_ref(),
        &mut std::io::stderr(),
    )?;

    match mode {
        CredentialMode::Encrypted => {
            println!("API key saved (encrypted). Remember your password.")
        }
        _ => println!("API key saved (no password)."),
    }
    Ok(())
}

/// Save the key. When it will be kept unencrypted the warning goes to
/// `warn` before anything is written.
fn save_api_key(
    store: &CredentialStore,
    secret: &SecretString,
    passphrase: Option<&SecretString>,
    warn: &mut dyn Write,
) -> Result<CredentialMode> {
    if passphrase.map_or(true, |p| p.expose_secret().is_empty()) {
        writeln!(warn, "{PLAINTEXT_WARNING}").context("writing warning")?;
    }
    initialize(store, secret, passphrase).context("saving API key")
}

fn cmd_key_status(config: &RectshotConfig) -> Result<()> {
    let store = CredentialStore::new(open_store(config)?);
    let mode = store.load().context("reading stored API key")?.mode();
    println!("API key: {mode}");
    println!("storage: {}", config.storage.path.display());
    Ok(())
}

async fn cmd_key_verify(config: &RectshotConfig, passphrase: Option<SecretString>) -> Result<()> {
    let store = CredentialStore::new(open_store(config)?);
    let mode = store.load().context("reading stored API key")?.mode();
    let flow = UnlockFlow::new(store, prompter(passphrase));

    match flow.unlock().await {
        Ok(_) => {
            println!("API key unlocked ({mode}).");
            Ok(())
        }
        Err(e) => {
            if let Some(message) = e.user_message() {
                eprintln!("{message}");
            }
            anyhow::bail!("unlock failed: {e}")
        }
    }
}

fn cmd_key_clear(config: &RectshotConfig) -> Result<()> {
    let store = CredentialStore::new(open_store(config)?);
    store.clear().context("clearing stored API key")?;
    println!("Stored API key removed.");
    Ok(())
}

// ── `rectshot settings ...` ───────────────────────────────────────────────────

fn cmd_settings_show(config: &RectshotConfig) -> Result<()> {
    let store = open_store(config)?;
    let prefs = load_preferences(&*store).context("reading preferences")?;
    println!("show rectangle:   {}", prefs.show_rectangle);
    println!("select shortcut:  {}", prefs.enable_select_shortcut);
    println!("model:            {}", prefs.selected_model);
    Ok(())
}

fn cmd_settings_set(
    config: &RectshotConfig,
    show_rectangle: Option<bool>,
    select_shortcut: Option<bool>,
    model: Option<String>,
) -> Result<()> {
    let store = open_store(config)?;
    let mut prefs = load_preferences(&*store).context("reading preferences")?;

    if let Some(show) = show_rectangle {
        prefs.show_rectangle = show;
    }
    if let Some(enabled) = select_shortcut {
        prefs.enable_select_shortcut = enabled;
    }
    if let Some(model) = model {
        let model = model.trim();
        anyhow::ensure!(!model.is_empty(), "model name must not be empty");
        prefs.selected_model = model.to_string();
    }

    save_preferences(&*store, &prefs).context("saving preferences")?;
    cmd_settings_show(config)
}

// ── `rectshot config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &RectshotConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── `rectshot explain` ────────────────────────────────────────────────────────

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, message: &str) {
        eprintln!("{message}");
    }
}

struct ProgressView;

impl HistoryView for ProgressView {
    fn render(&self, state: &RenderState) {
        if let RenderState::Entry {
            position,
            total,
            status: EntryStatus::Loading,
            text,
        } = state
        {
            eprintln!("[{position}/{total}] {text}");
        }
    }
}

async fn cmd_explain(
    config: &RectshotConfig,
    image: &Path,
    rect: CaptureRect,
    dpr: f64,
    passphrase: Option<SecretString>,
) -> Result<()> {
    let png = tokio::fs::read(image)
        .await
        .with_context(|| format!("reading {}", image.display()))?;

    let store = open_store(config)?;
    let prefs = load_preferences(&*store)
        .context("reading preferences")?;
    let provider = OpenAiResponsesClient::new(config.provider.clone())
        .context("building HTTP client")?;

    let ctx = PageContext::new(
        prefs,
        UnlockFlow::new(CredentialStore::new(store), prompter(passphrase)),
        Arc::new(provider),
        Arc::new(ProgressView),
        Arc::new(StderrNotifier),
    );

    ctx.handle_event(InboundEvent::CaptureResult {
        data_url: png_data_url(&png),
        rect,
        dpr: Some(dpr),
    })
    .await;

    match ctx.proceed().await {
        ProceedOutcome::Submitted(_) => match ctx.render_state() {
            RenderState::Entry {
                status: EntryStatus::Done,
                text,
                ..
            } => {
                println!("{text}");
                Ok(())
            }
            RenderState::Entry { text, .. } => anyhow::bail!("{text}"),
            RenderState::Empty => anyhow::bail!("no response recorded"),
        },
        ProceedOutcome::EmptyCapture => anyhow::bail!("screenshot could not be cropped"),
        ProceedOutcome::Aborted => anyhow::bail!("no API key available"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rect_accepts_four_numbers() {
        let rect = parse_rect("10, 20.5,30,40").unwrap();
        assert_eq!(
            rect,
            CaptureRect {
                x: 10.0,
                y: 20.5,
                width: 30.0,
                height: 40.0
            }
        );
    }

    #[test]
    fn test_parse_rect_rejects_bad_input() {
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,b,c,d").is_err());
        assert!(parse_rect("0,0,0,10").is_err());
        assert!(parse_rect("0,0,2,2").is_err());
        assert!(parse_rect("0,0,100,4.9").is_err());
        assert!(parse_rect("inf,0,10,10").is_err());
    }

    #[test]
    fn test_plaintext_warning_precedes_save() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = JsonFileStore::open(&blocker.join("storage.json")).unwrap();
        let store = CredentialStore::new(Arc::new(store));

        let mut warned = Vec::new();
        let result = save_api_key(&store, &SecretString::from("sk-abc"), None, &mut warned);

        assert!(result.is_err(), "store is unwritable");
        assert_eq!(
            String::from_utf8(warned).unwrap().trim_end(),
            PLAINTEXT_WARNING
        );
    }

    #[test]
    fn test_encrypted_save_prints_no_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::open(&tmp.path().join("storage.json")).unwrap();
        let store = CredentialStore::new(Arc::new(store));

        let mut warned = Vec::new();
        let mode = save_api_key(
            &store,
            &SecretString::from("sk-xyz"),
            Some(&SecretString::from("hunter2")),
            &mut warned,
        )
        .unwrap();

        assert_eq!(mode, CredentialMode::Encrypted);
        assert!(warned.is_empty());
    }

    #[test]
    fn test_parse_rect_normalizes_negative_extent() {
        let rect = parse_rect("10,10,-6,-8").unwrap();
        assert_eq!(
            rect,
            CaptureRect {
                x: 4.0,
                y: 2.0,
                width: 6.0,
                height: 8.0
            }
        );
    }

    #[test]
    fn test_cli_parses_explain() {
        let cli = Cli::try_parse_from([
            "rectshot",
            "explain",
            "shot.png",
            "--rect",
            "1,2,30,40",
            "--dpr",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Explain { rect, dpr, .. } => {
                assert_eq!(rect.width, 30.0);
                assert_eq!(dpr, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

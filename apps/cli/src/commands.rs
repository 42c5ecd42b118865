//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use clippress_api::ApiClient;
use clippress_auth::TokenManager;
use clippress_core::{ImageOutcome, PublishRequest};
use clippress_shared::{AppConfig, init_config, load_config, load_credentials, save_credentials};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Clippress — publish web clips as cloud documents.
#[derive(Parser)]
#[command(
    name = "clippress",
    version,
    about = "Publish captured web content as a structured cloud document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Publish a captured clip as a new document.
    Publish {
        /// Path to the clip file (text with inline ![alt](url) markers).
        file: PathBuf,

        /// Document title (defaults to the file stem).
        #[arg(short, long)]
        title: Option<String>,

        /// Destination folder token (defaults to config, then drive root).
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Show the destination folder that publishes default to.
    Folders,

    /// Show the user the current session belongs to.
    Whoami,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Create a default config file.
    Init,
    /// Print the effective configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "clippress=info",
        1 => "clippress=debug",
        _ => "clippress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Publish {
            file,
            title,
            folder,
        } => cmd_publish(&file, title.as_deref(), folder.as_deref()).await,
        Command::Folders => cmd_folders().await,
        Command::Whoami => cmd_whoami().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Build the authenticated API client from config + pasted credentials.
fn build_client(config: &AppConfig) -> Result<ApiClient> {
    let mut snapshot = load_credentials()?;

    // A relay endpoint in the config overrides the one recorded with the
    // pasted token JSON.
    if let Some(endpoint) = &config.relay.endpoint {
        snapshot.relay_endpoint = endpoint.clone();
    }

    let tokens = TokenManager::new(snapshot)?;
    Ok(ApiClient::new(tokens, &config.service.api_base)?)
}

// ---------------------------------------------------------------------------
// publish
// ---------------------------------------------------------------------------

async fn cmd_publish(file: &Path, title: Option<&str>, folder: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let client = build_client(&config)?;

    let content = std::fs::read_to_string(file)
        .map_err(|e| eyre!("could not read clip {}: {e}", file.display()))?;

    let title = match title {
        Some(t) => t.to_string(),
        None => file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled clip".to_string()),
    };

    let folder_token = match folder {
        Some(f) => f.to_string(),
        None if !config.defaults.folder_token.is_empty() => config.defaults.folder_token.clone(),
        None => client.root_folder_token().await,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    spinner.set_message(format!("Publishing \"{title}\"..."));

    let request = PublishRequest {
        title,
        content,
        folder_token,
    };
    let result = clippress_core::publish(&client, &config.service.doc_link_base, &request).await;

    spinner.finish_and_clear();
    let report = result?;

    // Persist the possibly refreshed tokens so the next run can reuse them.
    let snapshot = client.tokens().snapshot().await;
    if let Err(e) = save_credentials(&snapshot) {
        tracing::warn!(error = %e, "could not persist refreshed credentials");
    }

    println!("Published: {}", report.record.href);

    let failed: Vec<_> = report
        .images
        .iter()
        .filter_map(|img| match &img.outcome {
            ImageOutcome::Failed { reason } => Some((img.source_url.as_str(), reason.as_str())),
            ImageOutcome::Uploaded { .. } => None,
        })
        .collect();

    if !report.images.is_empty() {
        println!(
            "Images: {}/{} transferred",
            report.images.len() - failed.len(),
            report.images.len()
        );
    }
    for (url, reason) in &failed {
        println!("  omitted {url}: {reason}");
    }

    info!(
        document_id = %report.record.document_id,
        images = report.images.len(),
        images_failed = failed.len(),
        "publish finished"
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// folders / whoami
// ---------------------------------------------------------------------------

async fn cmd_folders() -> Result<()> {
    let config = load_config()?;

    if !config.defaults.folder_token.is_empty() {
        println!("default folder (from config): {}", config.defaults.folder_token);
        return Ok(());
    }

    let client = build_client(&config)?;
    let token = client.root_folder_token().await;
    if token.is_empty() {
        println!("default folder: drive root");
    } else {
        println!("default folder (drive root): {token}");
    }
    Ok(())
}

async fn cmd_whoami() -> Result<()> {
    let config = load_config()?;
    let client = build_client(&config)?;

    let profile = client.user_profile().await?;
    println!("{}", profile.name);
    if let Some(open_id) = &profile.open_id {
        println!("open_id: {open_id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created {}", path.display());
    println!(
        "Paste the relay's token JSON into {}",
        clippress_shared::credentials_file_path()?.display()
    );
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

//! Herbie - pseudo-English browser test scripting engine
//!
//! Main entry point for the Herbie CLI.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use herbie_config::{Config, ConfigLoader, ConfigValidator};

mod cli;
mod cmd_keywords;
mod cmd_script;

use cli::{Cli, Commands};

/// Settings every subcommand needs.
pub(crate) struct AppContext {
    pub config: Config,
    pub state_path: PathBuf,
}

fn herbie_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".herbie"))
        .unwrap_or_else(|| PathBuf::from(".herbie"))
}

/// Initialize tracing with console and file output.
///
/// The console layer writes to stderr so command output on stdout stays
/// machine readable.
fn init_tracing() -> anyhow::Result<()> {
    let log_dir = herbie_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("herbie")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Load the config file (a missing file means defaults) and validate it.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(ConfigLoader::default_path);
    let config = ConfigLoader::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    let result = ConfigValidator::validate(&config);
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        for error in &result.errors {
            tracing::error!("Config {}: {}", error.path, error.message);
        }
        bail!("Invalid configuration in {}", path.display());
    }

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let state_path = cli
        .state
        .unwrap_or_else(|| PathBuf::from(ConfigLoader::expand_path(&config.storage.state_path)));
    let ctx = AppContext { config, state_path };

    match cli.command {
        Commands::Parse {
            script,
            url,
            keywords,
        } => cmd_script::parse(&ctx, &script, url.as_deref(), keywords.as_deref()).await,
        Commands::Run {
            script,
            url,
            start_line,
            endpoint,
        } => cmd_script::run(&ctx, &script, url.as_deref(), start_line, endpoint.as_deref()).await,
        Commands::Resume { endpoint } => cmd_script::resume(&ctx, endpoint.as_deref()).await,
        Commands::Stop => cmd_script::stop(&ctx).await,
        Commands::Observe {
            script,
            task_name,
            tester_name,
            duration_secs,
            endpoint,
        } => {
            cmd_script::observe(
                &ctx,
                &script,
                task_name,
                tester_name,
                duration_secs,
                endpoint.as_deref(),
            )
            .await
        }
        Commands::Keywords { action } => cmd_keywords::handle_keywords_command(&ctx, action).await,
    }
}

// # qddnsd - quorum DDNS daemon
//
// Thin integration layer around qddns-core:
//
// 1. Parse the command line
// 2. Bootstrap or load the YAML configuration
// 3. Initialize tracing (console or log file)
// 4. Check for a newer release (unless suppressed)
// 5. Register provider backends and build the engine
// 6. Run the update loop until SIGTERM/SIGINT
//
// No DDNS logic lives here; everything interesting is in qddns-core.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use qddns_core::config::{self, DdnsConfig};
use qddns_core::{ProviderRegistry, UpdateEngine};
use qddns_source_http::HttpFetcher;

/// GitHub API endpoint for the latest release
const RELEASES_LATEST_URL: &str =
    "https://api.github.com/repos/quorum-ddns/quorum-ddns/releases/latest";

/// Timeout for the release check; it must never hold up startup for long
const UPDATE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit codes, following systemd conventions:
/// - 0: clean shutdown
/// - 1: configuration or startup error
/// - 2: runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Multi-source dynamic DNS updater
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.yml")]
    config: PathBuf,

    /// Skip the release update check at startup
    #[arg(long)]
    no_check_update: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // First run: write a starter config and ask the user to fill it in.
    if !cli.config.exists() {
        if let Err(e) = config::write_default_config(&cli.config) {
            eprintln!("failed to create default config: {e}");
            return DaemonExitCode::ConfigError.into();
        }
        eprintln!(
            "no config file found; a default {} has been created. \
             Edit it before running qddnsd again.",
            cli.config.display()
        );
        return DaemonExitCode::CleanShutdown.into();
    }

    let config = match DdnsConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&config) {
        eprintln!("failed to initialize logging: {e}");
        return DaemonExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(&cli, config).await {
            Ok(()) => DaemonExitCode::CleanShutdown,
            Err(e) => {
                error!("daemon error: {:#}", e);
                // Anything that fails before the loop starts is a
                // configuration problem by definition.
                DaemonExitCode::ConfigError
            }
        }
    });

    code.into()
}

/// Map the configured level and destination onto a tracing subscriber.
///
/// Unknown level names fall back to info rather than failing startup.
fn init_tracing(config: &DdnsConfig) -> Result<()> {
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if config.log_file.is_empty() {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)?;
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

async fn run_daemon(cli: &Cli, config: DdnsConfig) -> Result<()> {
    info!("qddnsd {} starting", env!("CARGO_PKG_VERSION"));

    if !cli.no_check_update {
        check_update().await;
    }

    info!("record:   {}", config.fqdn());
    info!("provider: {}", config.provider);
    info!("sources:  {}", config.ip_sources.len());
    info!("interval: {} min", config.update_interval_minutes);
    if config.log_file.is_empty() {
        info!("log:      console ({})", config.log_level);
    } else {
        info!("log:      {} ({})", config.log_file, config.log_level);
    }

    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    qddns_provider_cloudflare::register(&registry);

    #[cfg(feature = "aliyun")]
    qddns_provider_aliyun::register(&registry);

    // Unsupported provider names die here, before the loop starts.
    let provider = registry.create_provider(&config)?;

    let fetcher = HttpFetcher::new();
    let (mut engine, mut events) =
        UpdateEngine::new(Box::new(fetcher), provider, &config)?;

    // Surface engine events in the logs at debug level.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("engine event: {:?}", event);
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let signal_name = wait_for_shutdown().await;
        info!("received {}", signal_name);
        let _ = shutdown_tx.send(());
    });

    engine.run_with_shutdown(Some(shutdown_rx)).await?;

    info!("qddnsd stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> &'static str {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            // Without a SIGTERM handler we can still honor ctrl-c.
            warn!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = tokio::signal::ctrl_c() => "SIGINT",
    }
}

/// Wait for ctrl-c (non-Unix platforms)
#[cfg(not(unix))]
async fn wait_for_shutdown() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

#[derive(Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    html_url: String,
}

/// Compare the running version against the latest published release.
///
/// Failures are logged and swallowed; the check must never prevent the
/// updater from doing its job.
async fn check_update() {
    let current = concat!("v", env!("CARGO_PKG_VERSION"));

    let client = match reqwest::Client::builder()
        .timeout(UPDATE_CHECK_TIMEOUT)
        .user_agent(concat!("qddnsd/", env!("CARGO_PKG_VERSION")))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("update check skipped: {}", e);
            return;
        }
    };

    let release: Release = match client.get(RELEASES_LATEST_URL).send().await {
        Ok(response) => match response.json().await {
            Ok(release) => release,
            Err(e) => {
                warn!("failed to parse update info: {}", e);
                return;
            }
        },
        Err(e) => {
            warn!("failed to check for updates: {}", e);
            return;
        }
    };

    if !release.tag_name.is_empty() && release.tag_name != current {
        warn!(
            "new version available: {} -> {} (download: {})",
            current, release.tag_name, release.html_url
        );
    } else {
        info!("running the latest version ({})", current);
    }
}

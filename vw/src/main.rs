//! VersionWatch - version marker watcher
//!
//! CLI entry point: watches a deployed version marker and prompts on the
//! terminal when a new build lands.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use versionwatch::channel::UpdateChannel;
use versionwatch::cli::{Cli, Command};
use versionwatch::config::Config;
use versionwatch::notify::TerminalNotifier;
use versionwatch::visibility::VisibilitySignal;
use versionwatch::watcher::{VersionWatcher, WatchExit, WatcherHandle};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!(?level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Config) => cmd_config(&config),
        Some(Command::Watch {
            interval_ms,
            max_checks,
        }) => {
            if let Some(interval_ms) = interval_ms {
                debug!(interval_ms, "main: overriding poll interval");
                config.watcher.poll_interval_ms = interval_ms;
            }
            if let Some(max_checks) = max_checks {
                debug!(max_checks, "main: overriding max checks");
                config.watcher.max_checks = max_checks;
            }
            cmd_watch(&config).await
        }
        None => cmd_watch(&config).await,
    }
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}

/// Run the watcher until an update is confirmed or the process is stopped
async fn cmd_watch(config: &Config) -> Result<()> {
    let source = config.source.build().context("Failed to build version source")?;
    let notifier = Arc::new(TerminalNotifier::new());
    let channel = UpdateChannel::new(&config.watcher.channel_name);
    let endpoint = channel.register(Uuid::now_v7());
    let visibility = VisibilitySignal::new(true);

    let watcher = VersionWatcher::new(
        config.watcher.clone(),
        source,
        notifier,
        config.prompt.to_prompt(),
        endpoint,
        visibility.subscribe(),
    );
    let handle = watcher.handle();

    spawn_signal_listeners(handle, visibility)?;

    info!(
        context = %watcher.context_id(),
        source = %config.source.kind,
        "watching for new versions"
    );

    match watcher.run().await {
        WatchExit::Reload => {
            println!("Update confirmed.");
            if let Some(command) = &config.reload_command {
                run_reload_command(command).await?;
            }
        }
        WatchExit::TornDown => {
            debug!("cmd_watch: watcher torn down");
            println!("Stopped watching.");
        }
    }

    Ok(())
}

/// Wire process signals to the watcher: SIGUSR1/SIGUSR2 toggle visibility,
/// SIGINT/SIGTERM tear the context down.
fn spawn_signal_listeners(handle: WatcherHandle, visibility: VisibilitySignal) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigusr1 = signal(SignalKind::user_defined1()).context("Failed to register SIGUSR1 handler")?;
        let mut sigusr2 = signal(SignalKind::user_defined2()).context("Failed to register SIGUSR2 handler")?;
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigusr1.recv() => {
                        info!("SIGUSR1 received - marking context hidden");
                        visibility.set(false);
                    }
                    _ = sigusr2.recv() => {
                        info!("SIGUSR2 received - marking context visible");
                        visibility.set(true);
                    }
                    _ = sigterm.recv() => {
                        warn!("SIGTERM received");
                        let _ = handle.teardown().await;
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        warn!("SIGINT received");
                        let _ = handle.teardown().await;
                        break;
                    }
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        let _ = visibility;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("SIGINT received");
                let _ = handle.teardown().await;
            }
        });
    }

    Ok(())
}

/// Run the configured reload command, the process-world analog of the
/// page reload a confirmed update triggers in a browser.
async fn run_reload_command(command: &str) -> Result<()> {
    info!(%command, "running reload command");

    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .context("Failed to run reload command")?;

    if !status.success() {
        warn!(code = ?status.code(), "reload command exited nonzero");
    }

    Ok(())
}

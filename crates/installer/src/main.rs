//! Virtual USB driver installer
//!
//! Submits activation and deactivation requests for the virtual USB
//! DriverKit extension to the macOS system extension manager and reports
//! what the OS answers.

mod backend;
mod config;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{
    LOG_LEVELS, LifecycleController, setup_file_logging, setup_logging, wait_for_outcome,
};
use protocol::{ExtensionEvent, ExtensionIdentifier, RequestKind};
use std::process::ExitCode;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dext-installer")]
#[command(author, version, about = "Install or uninstall the virtual USB driver extension")]
#[command(long_about = "
Installs (activates) or uninstalls (deactivates) the virtual USB DriverKit
extension through the macOS system extension manager.

The binary must run from an app bundle in /Applications that embeds the
driver extension and is signed with the system-extension install entitlement.

EXAMPLES:
    # Two-button terminal UI
    dext-installer

    # Install and wait for the outcome
    dext-installer install

    # Uninstall
    dext-installer uninstall

    # Manage a differently-named build of the driver
    dext-installer --identifier com.example.VirtualUSBDriver.driver install

CONFIGURATION:
    The installer looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/Library/Application Support/virtual-usb/installer.toml (macOS)
    3. /etc/virtual-usb/installer.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", value_parser = LOG_LEVELS)]
    log_level: Option<String>,

    /// Bundle identifier of the driver extension (overrides config)
    #[arg(long, value_name = "BUNDLE_ID")]
    identifier: Option<ExtensionIdentifier>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Activate the driver extension and wait for the outcome
    Install,
    /// Deactivate the driver extension and wait for the outcome
    Uninstall,
    /// Two-button terminal UI (default)
    Tui,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.save_config {
        let config = config::InstallerConfig::default();
        let path = config::InstallerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let (config, config_path) = if let Some(ref path) = args.config {
        let (config, path) = config::InstallerConfig::load(Some(config::expand_path(path)))
            .context("Failed to load configuration")?;
        (config, Some(path))
    } else {
        config::InstallerConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.installer.log_level);
    let command = args.command.unwrap_or(Command::Tui);

    // The terminal UI owns stdout, so its logs go to a file
    if command == Command::Tui {
        let log_file = config.log_file();
        setup_file_logging(log_level, &log_file).context("Failed to setup logging")?;
    } else {
        setup_logging(log_level).context("Failed to setup logging")?;
    }

    info!("Virtual USB driver installer v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("Using default configuration"),
    }

    let identifier = args
        .identifier
        .unwrap_or_else(|| config.extension.identifier.clone());
    let policy = config.extension.replacement;

    let manager = backend::create_manager();
    let (controller, stream) = LifecycleController::new(manager, identifier, policy);
    info!(
        "Managing {} via {} (replacement policy: {:?})",
        controller.identifier(),
        controller.manager_name(),
        policy
    );

    match command {
        Command::Tui => {
            tui::run(controller, stream).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Install => run_request(&controller, &stream, RequestKind::Activate).await,
        Command::Uninstall => run_request(&controller, &stream, RequestKind::Deactivate).await,
    }
}

/// Submit one request and wait for the OS to finish or fail it
async fn run_request(
    controller: &LifecycleController,
    stream: &common::EventStream,
    kind: RequestKind,
) -> Result<ExitCode> {
    let request = match kind {
        RequestKind::Activate => controller.activate(),
        RequestKind::Deactivate => controller.deactivate(),
    }
    .with_context(|| format!("Failed to submit {} request", kind))?;

    info!("Waiting for the system to {} {}...", kind, request.identifier);

    tokio::select! {
        outcome = wait_for_outcome(stream, &request) => {
            match outcome.context("Lost connection to the extension manager")? {
                ExtensionEvent::Finished { .. } => Ok(ExitCode::SUCCESS),
                _ => Ok(ExitCode::FAILURE),
            }
        }
        _ = signal::ctrl_c() => {
            warn!("Interrupted; request {} keeps running under system control", request.id);
            Ok(ExitCode::FAILURE)
        }
    }
}

//! voicekeyd: the voicekey dictation runtime daemon.
//!
//! Loads configuration, acquires the single-instance lock, starts the
//! runtime coordinator, and waits for a shutdown signal.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use tracing_subscriber::EnvFilter;
use voicekey::error::ExitCode;
use voicekey::{Config, InstanceLock, RuntimeCoordinator, VoiceKeyError};

fn parse_config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(value));
        }
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voicekey=info,warn")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ProcessExitCode {
    voicekey::cpu::install_sigill_handler();
    if let Some(warning) = voicekey::cpu::check_cpu_compatibility() {
        eprintln!("{warning}");
    }

    init_logging();

    match run().await {
        Ok(()) => ProcessExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "voicekeyd exiting");
            let code: ExitCode = (&e).into();
            ProcessExitCode::from(code as u8)
        }
    }
}

async fn run() -> Result<(), VoiceKeyError> {
    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    let lock = InstanceLock::acquire()?;

    let coordinator = RuntimeCoordinator::from_config(&config, Some(lock))?;
    coordinator.start().await?;

    tracing::info!(mode = ?coordinator.mode(), "voicekeyd started");

    wait_for_shutdown_signal().await;

    tracing::info!("shutting down");
    coordinator.stop().await?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

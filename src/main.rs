//! Main entry point for the fan controller

use anyhow::Context;
use clap::Parser;
use log::{error, info};
use pi_fan_control::{args::Args, daemon, logging, Config, Controller};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Print version and build metadata for binary identity verification
    let pkg_version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_desc = option_env!("GIT_DESC").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    eprintln!(
        "pi-fan-control v{} (git {} / {}) built {}",
        pkg_version, git_hash, git_desc, build_time
    );

    let args = Args::parse();
    logging::setup(args.verbosity).context("failed to set up logging")?;

    let config = Config::load(&args.conf)
        .map_err(|e| {
            error!("Invalid configuration {}: {}", args.conf.display(), e);
            e
        })
        .with_context(|| format!("failed to load configuration from {}", args.conf.display()))?;

    // Handlers go in before any pin is claimed so a signal always reaches shutdown
    let cancel = CancellationToken::new();
    daemon::listen_for_signals(cancel.clone()).context("failed to install signal handlers")?;

    let mut controller = Controller::from_config(config).map_err(|e| {
        let what = if e.is_config() {
            "unsupported fan backend"
        } else {
            "failed to initialize fans"
        };
        anyhow::Error::new(e).context(what)
    })?;

    let outcome = if args.test {
        controller
            .sweep(&cancel, args.sweep_mode())
            .await
            .map(|report| info!("Test mode done: {:?}", report))
    } else {
        controller.run(&cancel).await
    };

    // Fans are released before any error propagates
    let shutdown = controller.shutdown();

    outcome.context("fan controller stopped")?;
    shutdown.context("failed to stop fans")?;
    Ok(())
}

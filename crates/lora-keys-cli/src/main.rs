//! lora-keys - write a LoRaWAN JoinEUI and AppKey to an attached Particle device.
//!
//! Exits 0 when the device accepted the keys and 1 on any failure.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod runner;

use cli::Cli;
use lora_keys_usb::ParticleBackend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse arguments
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(io) = e.print() {
                eprintln!("Failed to print usage: {io}");
            }
            return ExitCode::from(usage_status(e.kind()));
        }
    };

    // Initialize logging
    if let Err(e) = init_logging(cli.log_level()) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting lora-keys");

    let result = runner::provision(&cli, &ParticleBackend).await;
    ExitCode::from(runner::exit_status(&result))
}

/// Exit status for a command line that clap refused to parse.
///
/// Help and version output are successful runs. Every usage error exits 1
/// like any other failure, instead of clap's 2.
fn usage_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("lora_keys={level}").parse()?)
                .add_directive(format!("lora_keys_core={level}").parse()?)
                .add_directive(format!("lora_keys_usb={level}").parse()?),
        )
        .init();
    Ok(())
}

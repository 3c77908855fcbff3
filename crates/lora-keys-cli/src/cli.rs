//! Command line surface.

use clap::{ArgAction, Parser};
use lora_keys_core::RawKeys;

#[derive(Debug, Parser)]
#[command(name = "lora-keys")]
#[command(version, about = "Provision LoRaWAN join credentials onto an attached Particle device")]
pub struct Cli {
    /// JoinEUI as 16 hex characters, colons allowed (AA:BB:...)
    #[arg(long = "joinEui", visible_alias = "join-eui", value_name = "HEX")]
    pub join_eui: Option<String>,

    /// AppKey as 32 hex characters, colons allowed
    #[arg(long = "appKey", visible_alias = "app-key", value_name = "HEX")]
    pub app_key: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log level for this crate's targets.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Both keys as given on the command line.
    ///
    /// # Errors
    /// Returns an input error if either key is missing.
    pub fn raw_keys(&self) -> lora_keys_core::Result<RawKeys> {
        RawKeys::from_args(self.join_eui.clone(), self.app_key.clone())
    }
}

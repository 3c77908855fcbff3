//! Provisioning run: validate, build, send.

use anyhow::{Context, Result};
use lora_keys_core::{RawKeys, RequestPayload, sanitize_keys, validate_keys};
use lora_keys_usb::{DeviceBackend, DeviceSession};
use tracing::{error, info};

use crate::cli::Cli;

/// Turn raw command line keys into the request payload.
///
/// Nothing here touches the device, so a bad key never reaches it.
///
/// # Errors
/// Returns the first length or charset error, in key order.
pub fn prepare(raw: RawKeys) -> lora_keys_core::Result<RequestPayload> {
    info!(join_eui = %raw.join_eui, app_key = %raw.app_key, "Keys received");

    let specs = sanitize_keys(raw.into_specs());

    info!("Validating keys...");
    let keys = validate_keys(specs)?;

    info!("Creating request message...");
    let payload = RequestPayload::build(&keys)?;
    info!(payload = %payload, "Request message created");

    Ok(payload)
}

/// Provision the keys onto the single device `backend` exposes.
///
/// Returns the device's reply data, if any.
///
/// # Errors
/// Fails on invalid keys, on anything but exactly one attached device, and
/// on transport or device errors. Nothing is sent unless the keys are valid.
pub async fn run<B: DeviceBackend>(raw: RawKeys, backend: &B) -> Result<Option<Vec<u8>>> {
    // Validate keys before touching the device
    let payload = prepare(raw).context("Invalid key input")?;

    // Open the single attached device
    let mut session = DeviceSession::open(backend).await.context("Failed to open device")?;

    let reply = session.write_keys(&payload).await.context("Failed to write keys to device")?;
    if let Some(data) = &reply {
        info!(len = data.len(), data = %hex::encode(data), "Device replied");
    }

    info!(device = %session.device(), "Keys provisioned");
    Ok(reply)
}

/// Collect the keys from the command line and provision them.
///
/// # Errors
/// Fails if a key is missing, plus everything [`run`] fails on.
pub async fn provision<B: DeviceBackend>(cli: &Cli, backend: &B) -> Result<Option<Vec<u8>>> {
    info!("Getting keys...");
    let raw = cli.raw_keys()?;
    run(raw, backend).await
}

/// Process exit status for a finished run, logging the failure if any.
pub fn exit_status<T>(result: &Result<T>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Provisioning failed");
            1
        }
    }
}

//! Particle device detection and access over libusb.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusb::{Device, DeviceHandle, GlobalContext};
use tracing::{debug, info};

use crate::error::{TransportFault, UsbError, UsbResult};
use crate::protocol;
use crate::transport::{ControlChannel, ControlReply, DeviceBackend, DeviceCandidate};

/// Particle USB Vendor ID
pub const PARTICLE_VID: u16 = 0x2b04;
/// Product IDs in DFU mode are `0xd0xx`; application firmware uses `0xc0xx`.
const DFU_PID_PREFIX: u16 = 0xd000;
const PID_MODE_MASK: u16 = 0xff00;

/// Whether a USB device is a Particle device, in any mode.
///
/// Every Particle device counts towards discovery, so a device sitting in
/// DFU mode next to one running application firmware is still two devices.
#[must_use]
pub fn is_particle_device(vendor_id: u16) -> bool {
    vendor_id == PARTICLE_VID
}

/// Whether a Particle product ID belongs to a device in DFU mode.
#[must_use]
pub fn in_dfu_mode(product_id: u16) -> bool {
    product_id & PID_MODE_MASK == DFU_PID_PREFIX
}

/// Discovers Particle devices through the global libusb context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParticleBackend;

#[async_trait]
impl DeviceBackend for ParticleBackend {
    type Device = ParticleDevice;

    async fn list_devices(&self) -> UsbResult<Vec<ParticleDevice>> {
        tokio::task::spawn_blocking(enumerate)
            .await
            .map_err(|e| UsbError::Enumerate(TransportFault::Join(e)))?
    }
}

fn enumerate() -> UsbResult<Vec<ParticleDevice>> {
    let devices = rusb::devices().map_err(|e| UsbError::Enumerate(e.into()))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };

        if !is_particle_device(desc.vendor_id()) {
            continue;
        }

        debug!(
            product_id = desc.product_id(),
            dfu = in_dfu_mode(desc.product_id()),
            bus = device.bus_number(),
            address = device.address(),
            "Particle device found"
        );
        found.push(ParticleDevice { device, product_id: desc.product_id() });
    }

    info!(count = found.len(), "USB enumeration complete");
    Ok(found)
}

/// A Particle device seen during enumeration.
#[derive(Debug)]
pub struct ParticleDevice {
    device: Device<GlobalContext>,
    product_id: u16,
}

#[async_trait]
impl DeviceCandidate for ParticleDevice {
    fn describe(&self) -> String {
        let mode = if in_dfu_mode(self.product_id) { ", DFU mode" } else { "" };
        format!(
            "{PARTICLE_VID:04x}:{:04x} (bus {} address {}{mode})",
            self.product_id,
            self.device.bus_number(),
            self.device.address()
        )
    }

    async fn open(&self) -> Result<Box<dyn ControlChannel>, TransportFault> {
        let device = self.device.clone();
        let handle = tokio::task::spawn_blocking(move || device.open()).await??;
        Ok(Box::new(ParticleChannel { handle: Arc::new(handle) }))
    }
}

/// An opened Particle device.
pub struct ParticleChannel {
    handle: Arc<DeviceHandle<GlobalContext>>,
}

#[async_trait]
impl ControlChannel for ParticleChannel {
    async fn send_control_request(
        &mut self,
        request_type: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<ControlReply, TransportFault> {
        let handle = Arc::clone(&self.handle);
        let payload = payload.to_vec();
        tokio::task::spawn_blocking(move || {
            protocol::transact(handle.as_ref(), request_type, &payload, timeout)
        })
        .await?
    }
}

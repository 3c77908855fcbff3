//! Single-device provisioning session.

use std::fmt;

use lora_keys_core::RequestPayload;
use tracing::{debug, info};

use crate::error::{TransportFault, UsbError, UsbResult};
use crate::transport::{
    ControlChannel, DeviceBackend, DeviceCandidate, REQUEST_TIMEOUT, REQUEST_TYPE,
};

/// Exclusive session on the one attached device.
pub struct DeviceSession {
    channel: Box<dyn ControlChannel>,
    device: String,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession").field("device", &self.device).finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// Discover attached devices and open the only one.
    ///
    /// # Errors
    /// Returns [`UsbError::NoDevice`] if nothing is attached,
    /// [`UsbError::MultipleDevices`] if more than one device is attached,
    /// and [`UsbError::Open`] if the device cannot be opened.
    pub async fn open<B: DeviceBackend>(backend: &B) -> UsbResult<Self> {
        info!("Opening device...");
        let devices = backend.list_devices().await?;

        let device = match devices.as_slice() {
            [] => return Err(UsbError::NoDevice),
            [device] => device,
            many => return Err(UsbError::MultipleDevices(many.len())),
        };

        let description = device.describe();
        let channel = device
            .open()
            .await
            .map_err(|source| UsbError::Open { device: description.clone(), source })?;

        info!(device = %description, "Device opened");
        Ok(Self::from_channel(channel, description))
    }

    /// Wrap an already opened channel.
    #[must_use]
    pub fn from_channel(channel: Box<dyn ControlChannel>, device: String) -> Self {
        Self { channel, device }
    }

    /// Description of the opened device.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Send the keys payload as the application-custom control request.
    ///
    /// # Errors
    /// See [`DeviceSession::send_request`].
    pub async fn write_keys(&mut self, payload: &RequestPayload) -> UsbResult<Option<Vec<u8>>> {
        info!("Writing to device...");
        self.send_request(REQUEST_TYPE, payload.as_bytes()).await
    }

    /// Send one control request and return the reply data, if any.
    ///
    /// # Errors
    /// Returns [`UsbError::Transport`] if the transfer fails or exceeds
    /// [`REQUEST_TIMEOUT`], and [`UsbError::Device`] if the device answers
    /// with a negative result code.
    pub async fn send_request(
        &mut self,
        request_type: u16,
        data: &[u8],
    ) -> UsbResult<Option<Vec<u8>>> {
        info!("Sending request...");

        let pending = self.channel.send_control_request(request_type, data, REQUEST_TIMEOUT);
        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, pending).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(fault)) => return Err(UsbError::Transport(fault)),
            Err(_) => return Err(UsbError::Transport(TransportFault::Timeout(REQUEST_TIMEOUT))),
        };

        debug!(result = reply.result, device = %self.device, "Control request answered");
        if reply.result < 0 {
            return Err(UsbError::Device(reply.result));
        }

        Ok(reply.data)
    }
}

//! Device access traits.
//!
//! The session only talks to devices through these traits, so discovery and
//! transfers can be swapped out in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TransportFault, UsbResult};

/// Application-custom control request class understood by the firmware.
pub const REQUEST_TYPE: u16 = 10;

/// Upper bound for a single control request, all stages included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Device reply to a control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlReply {
    /// Result code reported by the device; negative means rejected.
    pub result: i32,
    /// Reply data, if the device returned any.
    pub data: Option<Vec<u8>>,
}

/// An opened device that accepts control requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlChannel: Send {
    async fn send_control_request(
        &mut self,
        request_type: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<ControlReply, TransportFault>;
}

/// A discovered, not yet opened device.
#[async_trait]
pub trait DeviceCandidate: Send + Sync {
    /// Human-readable identification for logs and errors.
    fn describe(&self) -> String;

    /// Open the device for exclusive use.
    async fn open(&self) -> Result<Box<dyn ControlChannel>, TransportFault>;
}

/// Source of attached devices.
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    type Device: DeviceCandidate;

    /// List every attached device this tool can provision.
    async fn list_devices(&self) -> UsbResult<Vec<Self::Device>>;
}

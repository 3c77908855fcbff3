//! USB error types.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{ServiceStatus, ServiceType};

/// Device session error type.
#[derive(Debug, Error)]
pub enum UsbError {
    #[error("Failed to enumerate USB devices")]
    Enumerate(#[source] TransportFault),

    #[error("No devices found")]
    NoDevice,

    #[error("Multiple devices found ({0} attached)")]
    MultipleDevices(usize),

    #[error("Failed to open device {device}")]
    Open {
        device: String,
        #[source]
        source: TransportFault,
    },

    #[error("Failed to send control request")]
    Transport(#[source] TransportFault),

    #[error("Device-OS error code: {0}")]
    Device(i32),
}

/// Underlying cause of a transport-level failure.
#[derive(Debug, Error)]
pub enum TransportFault {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{service:?} request failed with status {status:?}")]
    Status { service: ServiceType, status: ServiceStatus },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("USB worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for device session operations.
pub type UsbResult<T> = Result<T, UsbError>;

//! lora-keys USB - Particle device access.
//!
//! This crate finds the single attached Particle device and delivers a
//! request payload to it as an application-custom control request.
//!
//! Devices are reached through the [`DeviceBackend`] / [`DeviceCandidate`] /
//! [`ControlChannel`] traits; [`ParticleBackend`] implements them on top of
//! libusb.

pub mod device;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use device::{PARTICLE_VID, ParticleBackend, ParticleDevice, in_dfu_mode, is_particle_device};
pub use error::{TransportFault, UsbError, UsbResult};
pub use session::DeviceSession;
pub use transport::{
    ControlChannel, ControlReply, DeviceBackend, DeviceCandidate, REQUEST_TIMEOUT, REQUEST_TYPE,
};

//! lora-keys Core - LoRaWAN key handling.
//!
//! This crate turns user-supplied JoinEUI and AppKey strings into the exact
//! request payload the device firmware expects. It performs no I/O.

pub mod error;
pub mod key;
pub mod payload;

pub use error::{Error, Result};
pub use key::{KeySpec, RawKeys, ValidatedKey, sanitize, sanitize_keys, validate_keys};
pub use payload::{KEYS_PAYLOAD_LEN, RequestPayload};

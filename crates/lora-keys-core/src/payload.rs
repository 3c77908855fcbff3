//! Request payload construction.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::key::{APP_KEY_HEX_LEN, JOIN_EUI_HEX_LEN, ValidatedKey};

/// Size of the keys request the firmware accepts: JoinEUI (8) + AppKey (16).
pub const KEYS_PAYLOAD_LEN: usize = (JOIN_EUI_HEX_LEN + APP_KEY_HEX_LEN) / 2;

/// The exact bytes sent to the device. No framing, checksum or length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload(Vec<u8>);

impl RequestPayload {
    /// Concatenate the decoded keys in order.
    ///
    /// # Errors
    /// Returns [`Error::PayloadSize`] if the result is not
    /// [`KEYS_PAYLOAD_LEN`] bytes long.
    pub fn build(keys: &[ValidatedKey]) -> Result<Self> {
        let bytes: Vec<u8> = keys.iter().flat_map(|key| key.bytes().iter().copied()).collect();

        if bytes.len() != KEYS_PAYLOAD_LEN {
            return Err(Error::PayloadSize { expected: KEYS_PAYLOAD_LEN, actual: bytes.len() });
        }

        debug!(len = bytes.len(), keys = keys.len(), "Request payload built");
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for RequestPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RequestPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;
    use crate::key::{KeySpec, RawKeys, sanitize_keys, validate_keys};

    fn build(join_eui: &str, app_key: &str) -> Result<RequestPayload> {
        let specs = RawKeys { join_eui: join_eui.into(), app_key: app_key.into() }.into_specs();
        RequestPayload::build(&validate_keys(sanitize_keys(specs))?)
    }

    #[test]
    fn test_payload_layout() {
        let payload = build("AABBCCDDEEFF0011", "00112233445566778899AABBCCDDEEFF").unwrap();

        assert_eq!(payload.len(), KEYS_PAYLOAD_LEN);
        assert_eq!(&payload.as_bytes()[..8], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);
        assert_eq!(
            &payload.as_bytes()[8..],
            &[
                0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC,
                0xDD, 0xEE, 0xFF
            ]
        );
    }

    #[test]
    fn test_payload_display_is_lower_hex() {
        let payload =
            build("AA:BB:CC:DD:EE:FF:00:11", "00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD:EE:FF")
                .unwrap();
        assert_eq!(payload.to_string(), "aabbccddeeff001100112233445566778899aabbccddeeff");
    }

    #[test]
    fn test_payload_rejects_wrong_total_size() {
        let keys = validate_keys(vec![KeySpec::new("joinEui", "AABBCCDDEEFF0011", 16)]).unwrap();
        assert_matches!(
            RequestPayload::build(&keys),
            Err(Error::PayloadSize { expected: 24, actual: 8 })
        );
    }

    proptest! {
        #[test]
        fn prop_payload_is_concatenation(
            join_eui in proptest::collection::vec(any::<u8>(), 8),
            app_key in proptest::collection::vec(any::<u8>(), 16),
            upper in any::<bool>(),
            colons in any::<bool>(),
        ) {
            let render = |bytes: &[u8]| {
                let hex = if upper { hex::encode_upper(bytes) } else { hex::encode(bytes) };
                if colons {
                    hex.as_bytes()
                        .chunks(2)
                        .map(|pair| String::from_utf8_lossy(pair).into_owned())
                        .collect::<Vec<_>>()
                        .join(":")
                } else {
                    hex
                }
            };

            let payload = build(&render(&join_eui), &render(&app_key)).unwrap();
            let expected: Vec<u8> = join_eui.iter().chain(app_key.iter()).copied().collect();
            prop_assert_eq!(payload.as_bytes(), expected.as_slice());
        }
    }
}

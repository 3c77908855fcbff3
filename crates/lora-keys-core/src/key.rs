//! Key sanitization and validation.
//!
//! Keys travel through the pipeline as an ordered list of [`KeySpec`]s. Each
//! spec is sanitized (separators stripped), then validated into a
//! [`ValidatedKey`]. Only validated keys can be packed into a request payload.

use tracing::debug;

use crate::error::{Error, Result};

/// Separator accepted between hex byte pairs (`AA:BB:CC`).
pub const SEPARATOR: char = ':';

/// Display name of the JoinEUI key.
pub const JOIN_EUI_NAME: &str = "joinEui";
/// JoinEUI length in hex characters (8 bytes).
pub const JOIN_EUI_HEX_LEN: usize = 16;

/// Display name of the AppKey.
pub const APP_KEY_NAME: &str = "appKey";
/// AppKey length in hex characters (16 bytes).
pub const APP_KEY_HEX_LEN: usize = 32;

/// Strip every separator from a raw key string.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(|c| *c != SEPARATOR).collect()
}

/// The two keys as supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeys {
    pub join_eui: String,
    pub app_key: String,
}

impl RawKeys {
    /// Build from optional command line values.
    ///
    /// # Errors
    /// Returns [`Error::MissingInput`] if either value is absent or empty.
    pub fn from_args(join_eui: Option<String>, app_key: Option<String>) -> Result<Self> {
        match (join_eui, app_key) {
            (Some(join_eui), Some(app_key)) if !join_eui.is_empty() && !app_key.is_empty() => {
                Ok(Self { join_eui, app_key })
            }
            _ => Err(Error::MissingInput(format!("{JOIN_EUI_NAME} and {APP_KEY_NAME}"))),
        }
    }

    /// Ordered key specs: JoinEUI first, then AppKey.
    #[must_use]
    pub fn into_specs(self) -> Vec<KeySpec> {
        vec![
            KeySpec::new(JOIN_EUI_NAME, self.join_eui, JOIN_EUI_HEX_LEN),
            KeySpec::new(APP_KEY_NAME, self.app_key, APP_KEY_HEX_LEN),
        ]
    }
}

/// A named key value together with its expected hex length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    name: String,
    value: String,
    expected_hex_len: usize,
}

impl KeySpec {
    /// Create a new key spec.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, expected_hex_len: usize) -> Self {
        Self { name: name.into(), value: value.into(), expected_hex_len }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn expected_hex_len(&self) -> usize {
        self.expected_hex_len
    }

    /// Return the same spec with separators removed from its value.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let value = sanitize(&self.value);
        Self { value, ..self }
    }

    /// Check length, then charset, then decode.
    ///
    /// # Errors
    /// Returns [`Error::InvalidLength`] if the value is not exactly the
    /// expected number of characters, or [`Error::InvalidFormat`] if it
    /// contains anything outside `[0-9a-fA-F]`.
    pub fn validate(self) -> Result<ValidatedKey> {
        if self.value.chars().count() != self.expected_hex_len {
            return Err(Error::InvalidLength { name: self.name, expected: self.expected_hex_len });
        }

        if !self.value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidFormat { name: self.name });
        }

        let bytes = match hex::decode(&self.value) {
            Ok(bytes) => bytes,
            Err(source) => return Err(Error::Decode { name: self.name, source }),
        };

        debug!(name = %self.name, len = bytes.len(), "Key validated");
        Ok(ValidatedKey { name: self.name, bytes })
    }
}

/// Sanitize every spec, preserving order.
#[must_use]
pub fn sanitize_keys(specs: Vec<KeySpec>) -> Vec<KeySpec> {
    specs.into_iter().map(KeySpec::sanitized).collect()
}

/// Validate every spec in order, stopping at the first failure.
///
/// # Errors
/// Returns the first validation error encountered.
pub fn validate_keys(specs: Vec<KeySpec>) -> Result<Vec<ValidatedKey>> {
    specs.into_iter().map(KeySpec::validate).collect()
}

/// A key that passed length and charset validation, held as decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedKey {
    name: String,
    bytes: Vec<u8>,
}

impl ValidatedKey {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded key bytes, big-endian as written.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    fn specs(join_eui: &str, app_key: &str) -> Vec<KeySpec> {
        RawKeys { join_eui: join_eui.into(), app_key: app_key.into() }.into_specs()
    }

    #[test]
    fn test_sanitize_strips_colons() {
        assert_eq!(sanitize("AA:BB:CC:DD:EE:FF:00:11"), "AABBCCDDEEFF0011");
        assert_eq!(sanitize("::"), "");
    }

    #[test]
    fn test_sanitize_keeps_other_separators() {
        assert_eq!(sanitize("AA-BB CC"), "AA-BB CC");
    }

    #[test]
    fn test_from_args_requires_both_keys() {
        assert_matches!(
            RawKeys::from_args(Some("AABB".into()), None),
            Err(Error::MissingInput(_))
        );
        assert_matches!(RawKeys::from_args(None, Some("AABB".into())), Err(Error::MissingInput(_)));
        assert_matches!(
            RawKeys::from_args(Some(String::new()), Some("AABB".into())),
            Err(Error::MissingInput(_))
        );
    }

    #[test]
    fn test_missing_input_message() {
        let err = RawKeys::from_args(None, None).unwrap_err();
        assert_eq!(err.to_string(), "You must provide values for joinEui and appKey.");
    }

    #[test]
    fn test_into_specs_order_and_lengths() {
        let specs = specs("a", "b");
        assert_eq!(specs[0].name(), JOIN_EUI_NAME);
        assert_eq!(specs[0].expected_hex_len(), 16);
        assert_eq!(specs[1].name(), APP_KEY_NAME);
        assert_eq!(specs[1].expected_hex_len(), 32);
    }

    #[test]
    fn test_validate_with_colons() {
        let keys = validate_keys(sanitize_keys(specs(
            "AA:BB:CC:DD:EE:FF:00:11",
            "00112233445566778899AABBCCDDEEFF",
        )))
        .unwrap();

        assert_eq!(keys[0].bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);
        assert_eq!(keys[1].bytes().len(), 16);
        assert_eq!(keys[1].bytes()[15], 0xFF);
    }

    #[test]
    fn test_app_key_too_long_names_app_key() {
        let err = validate_keys(sanitize_keys(specs(
            "AABBCCDDEEFF0011",
            "00112233445566778899AABBCCDDEEFF0",
        )))
        .unwrap_err();

        assert_matches!(&err, Error::InvalidLength { name, expected: 32 } if name == "appKey");
        assert_eq!(err.to_string(), "appKey must be 32 characters long.");
    }

    #[test]
    fn test_join_eui_checked_before_app_key() {
        // Both keys are bad; the JoinEUI error wins.
        let err = validate_keys(specs("XYZ", "nothex")).unwrap_err();
        assert_eq!(err.key_name(), Some("joinEui"));
    }

    #[test]
    fn test_length_checked_before_charset() {
        let err = validate_keys(specs("GG", "00112233445566778899AABBCCDDEEFF")).unwrap_err();
        assert_matches!(err, Error::InvalidLength { .. });
    }

    #[test]
    fn test_non_hex_join_eui() {
        let err = validate_keys(specs("AABBCCDDEEFF001G", "00112233445566778899AABBCCDDEEFF"))
            .unwrap_err();
        assert_matches!(&err, Error::InvalidFormat { name } if name == "joinEui");
        assert_eq!(err.to_string(), "joinEui must be a hex string.");
    }

    #[test]
    fn test_multibyte_character_counts_once() {
        // 15 ASCII chars + one two-byte char: right length, wrong charset.
        let err = validate_keys(specs("AABBCCDDEEFF001é", "00112233445566778899AABBCCDDEEFF"))
            .unwrap_err();
        assert_matches!(err, Error::InvalidFormat { .. });
    }

    #[test]
    fn test_generic_spec_list() {
        let keys = validate_keys(vec![
            KeySpec::new("devEui", "01:02:03:04:05:06:07:08", 16).sanitized(),
            KeySpec::new("extra", "beef", 4),
        ])
        .unwrap();
        assert_eq!(keys[0].name(), "devEui");
        assert_eq!(keys[1].bytes(), &[0xBE, 0xEF]);
    }

    fn hex_string(len: usize) -> impl Strategy<Value = String> {
        proptest::string::string_regex(&format!("[0-9a-fA-F]{{{len}}}")).unwrap()
    }

    proptest! {
        #[test]
        fn prop_sanitize_idempotent(raw in "[0-9a-fA-F:]{0,48}") {
            let once = sanitize(&raw);
            prop_assert_eq!(sanitize(&once), once.clone());
            prop_assert!(!once.contains(SEPARATOR));
        }

        #[test]
        fn prop_colon_free_unchanged(raw in "[0-9a-zA-Z]{0,48}") {
            prop_assert_eq!(sanitize(&raw), raw);
        }

        #[test]
        fn prop_wrong_length_names_field(join_eui in hex_string(16), len in 0usize..64) {
            prop_assume!(len != APP_KEY_HEX_LEN);
            let app_key = "a".repeat(len);
            let err = validate_keys(specs(&join_eui, &app_key)).unwrap_err();
            prop_assert!(
                matches!(&err, Error::InvalidLength { name, expected: 32 } if name == "appKey"),
                "unexpected error: {err:?}"
            );
        }

        #[test]
        fn prop_non_hex_names_field(prefix in hex_string(15), bad in "[g-zG-Z!#%]") {
            let join_eui = format!("{prefix}{bad}");
            let err = validate_keys(specs(&join_eui, &"0".repeat(32))).unwrap_err();
            prop_assert!(
                matches!(&err, Error::InvalidFormat { name } if name == "joinEui"),
                "unexpected error: {err:?}"
            );
        }
    }
}

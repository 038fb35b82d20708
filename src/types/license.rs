//! Opaque license protocol messages and the keys they unlock

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Content-binding challenge produced by a cryptographic module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge(pub Vec<u8>);

impl Challenge {
    /// Raw challenge bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// License bytes returned by a license server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseResponse(pub Vec<u8>);

impl LicenseResponse {
    /// Raw license bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Decrypted key-ID to key-bytes mapping
///
/// Key-IDs are stored as lowercase hex without dashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKeys {
    keys: BTreeMap<String, Vec<u8>>,
}

/// Normalise a key-ID given as hex, with or without UUID dashes
pub fn normalize_kid(kid: &str) -> String {
    kid.chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl ContentKeys {
    /// Create an empty key set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key by raw key-ID bytes
    pub fn insert(&mut self, kid: &[u8], key: Vec<u8>) {
        self.keys.insert(hex::encode(kid), key);
    }

    /// Insert a key by hex key-ID
    pub fn insert_hex(&mut self, kid: &str, key: Vec<u8>) {
        self.keys.insert(normalize_kid(kid), key);
    }

    /// Look up a key by hex key-ID
    pub fn get(&self, kid: &str) -> Option<&[u8]> {
        self.keys.get(&normalize_kid(kid)).map(Vec::as_slice)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is present
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key-IDs from `required` that this set does not contain
    pub fn missing<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        required
            .into_iter()
            .map(|kid| normalize_kid(kid))
            .filter(|kid| !self.keys.contains_key(kid))
            .collect()
    }

    /// Whether every key-ID in `required` is present
    pub fn covers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.missing(required).is_empty()
    }

    /// Iterate over `(kid, key)` pairs in key-ID order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Render as `kid:key` hex pairs, the form accepted by common decrypters
    pub fn to_kid_key_pairs(&self) -> Vec<String> {
        self.iter()
            .map(|(kid, key)| format!("{}:{}", kid, hex::encode(key)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kid_normalisation() {
        let mut keys = ContentKeys::new();
        keys.insert_hex("0A0B0C0D-0000-0000-0000-000000000001", vec![1, 2, 3]);

        assert_eq!(keys.get("0a0b0c0d000000000000000000000001"), Some(&[1u8, 2, 3][..]));
        assert_eq!(keys.get("0A0B0C0D-0000-0000-0000-000000000001"), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_coverage() {
        let mut keys = ContentKeys::new();
        keys.insert(&[0xaa; 16], vec![0x11; 16]);

        let present = hex::encode([0xaa; 16]);
        let absent = hex::encode([0xbb; 16]);

        assert!(keys.covers(&[present.clone()]));
        assert!(!keys.covers(&[present.clone(), absent.clone()]));
        assert_eq!(keys.missing(&[present, absent.clone()]), vec![absent]);
        assert!(keys.covers(&Vec::<String>::new()));
    }

    #[test]
    fn test_kid_key_rendering() {
        let mut keys = ContentKeys::new();
        keys.insert(&[0x01, 0x02], vec![0xff, 0x00]);
        assert_eq!(keys.to_kid_key_pairs(), vec!["0102:ff00".to_string()]);
    }
}

//! Cryptographic module seam
//!
//! The module producing challenges and decoding licenses (e.g. a DRM client
//! device implementation) is external. Its failures are reported as
//! `anyhow` errors and classified by the negotiator.

use crate::types::{Challenge, ContentKeys, KeySystemParams, LicenseResponse};

/// DRM client module bound to one device identity
pub trait CryptoModule: Send + Sync {
    /// Produce a challenge bound to the given key system parameters
    fn generate_challenge(&self, params: &KeySystemParams) -> anyhow::Result<Challenge>;

    /// Recover content keys from license bytes
    fn decode_license(&self, response: &LicenseResponse) -> anyhow::Result<ContentKeys>;
}

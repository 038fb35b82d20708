//! Type definitions for stream resolution
//!
//! This module contains the data structures exchanged between the resolver
//! components and their external collaborators.

pub mod asset;
pub mod license;
pub mod stream;
pub mod token;

pub use asset::{AssetMetadata, ContentRef, KeySystemParams};
pub use license::{Challenge, ContentKeys, LicenseResponse, normalize_kid};
pub use stream::{
    DEFAULT_SIGNATURE_PARAM, Manifest, SignatureCipher, StreamLocation, StreamVariant,
};
pub use token::{AccessToken, UserToken};

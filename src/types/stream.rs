//! Stream variants and manifests

use crate::types::ContentRef;
use serde::{Deserialize, Serialize};

/// Query parameter name used when a cipher does not specify one
pub const DEFAULT_SIGNATURE_PARAM: &str = "signature";

/// Cipher-bearing stream location
///
/// Carried by providers as a form-encoded `s=..&sp=..&url=..` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCipher {
    /// Base media URL without the signature
    pub url: String,
    /// Query parameter the deciphered signature is appended as
    pub sp: String,
    /// Obfuscated signature
    pub s: String,
}

impl SignatureCipher {
    /// Parse a form-encoded signature cipher
    pub fn parse(encoded: &str) -> crate::Result<Self> {
        let mut url = None;
        let mut sp = None;
        let mut s = None;

        for (key, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
            match key.as_ref() {
                "url" => url = Some(value.into_owned()),
                "sp" => sp = Some(value.into_owned()),
                "s" => s = Some(value.into_owned()),
                _ => {}
            }
        }

        let url = url.ok_or_else(|| crate::Error::manifest("signature cipher has no url"))?;
        let s = s.ok_or_else(|| crate::Error::manifest("signature cipher has no s"))?;

        Ok(Self {
            url,
            sp: sp.unwrap_or_else(|| DEFAULT_SIGNATURE_PARAM.to_string()),
            s,
        })
    }
}

/// Where a variant's media can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamLocation {
    /// URL usable as-is
    Direct {
        /// Media URL
        url: String,
    },
    /// URL that needs a deciphered signature appended
    Ciphered(SignatureCipher),
}

impl StreamLocation {
    /// Whether the location needs the signature resolver
    pub fn is_ciphered(&self) -> bool {
        matches!(self, StreamLocation::Ciphered(_))
    }
}

/// One playback option of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Identifier unique within the manifest
    pub id: String,
    /// Bandwidth in bits per second
    pub bandwidth: u64,
    /// Codec tags
    #[serde(default)]
    pub codecs: Vec<String>,
    /// Width and height in pixels
    #[serde(default)]
    pub resolution: Option<(u32, u32)>,
    /// Whether playback needs DRM keys
    #[serde(default)]
    pub drm_required: bool,
    /// Raw or cipher-bearing location
    pub location: StreamLocation,
    /// Key-IDs (hex) the variant is encrypted with
    #[serde(default)]
    pub key_ids: Vec<String>,
}

impl StreamVariant {
    /// Create a DRM-free variant with a direct URL
    pub fn new(id: impl Into<String>, bandwidth: u64, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bandwidth,
            codecs: Vec::new(),
            resolution: None,
            drm_required: false,
            location: StreamLocation::Direct { url: url.into() },
            key_ids: Vec::new(),
        }
    }

    /// Mark the variant as DRM protected
    pub fn with_drm(mut self, key_ids: Vec<String>) -> Self {
        self.drm_required = true;
        self.key_ids = key_ids;
        self
    }

    /// Replace the location with a signature cipher
    pub fn with_cipher(mut self, cipher: SignatureCipher) -> Self {
        self.location = StreamLocation::Ciphered(cipher);
        self
    }

    /// Set codec tags
    pub fn with_codecs<I, S>(mut self, codecs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.codecs = codecs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some((width, height));
        self
    }
}

/// Variants offered for one asset within one resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Asset the manifest belongs to
    pub content_ref: ContentRef,
    /// Candidate variants in provider order
    pub variants: Vec<StreamVariant>,
    /// Player version that ciphered locations must be deciphered with
    #[serde(default)]
    pub cipher_version: Option<String>,
}

impl Manifest {
    /// Create a manifest
    pub fn new(content_ref: ContentRef, variants: Vec<StreamVariant>) -> Self {
        Self {
            content_ref,
            variants,
            cipher_version: None,
        }
    }

    /// Set the player version for ciphered variants
    pub fn with_cipher_version(mut self, version: impl Into<String>) -> Self {
        self.cipher_version = Some(version.into());
        self
    }
}

//! Asset identity and license metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-scoped identifier for a media asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    /// Wrap a raw content id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the content id from a provider page URL
    ///
    /// Provider URLs such as `/watch/<id>` or `/i/spaces/<id>` carry the id
    /// in their last non-empty path segment.
    pub fn from_url(raw: &str) -> crate::Result<Self> {
        let url = url::Url::parse(raw)?;
        url.path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|id| Self(id.to_string()))
            .ok_or_else(|| crate::Error::invalid_asset(raw, "URL has no path segment"))
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ContentRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Asset metadata returned by a provider adapter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// License server endpoint, absent for DRM-free assets
    #[serde(default)]
    pub license_server_url: Option<String>,
    /// Provider-supplied parameters forwarded to the license server
    #[serde(default)]
    pub license_query_params: Option<serde_json::Map<String, serde_json::Value>>,
    /// Location of the manifest
    pub manifest_url: String,
    /// Key URI from the manifest (e.g. a `data:` PSSH URI)
    #[serde(default)]
    pub key_uri: Option<String>,
}

impl AssetMetadata {
    /// Metadata for an asset without DRM
    pub fn drm_free(manifest_url: impl Into<String>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            ..Default::default()
        }
    }

    /// Attach license server details
    pub fn with_license(
        mut self,
        server_url: impl Into<String>,
        query_params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.license_server_url = Some(server_url.into());
        self.license_query_params = Some(query_params);
        self
    }

    /// Attach the manifest key URI
    pub fn with_key_uri(mut self, key_uri: impl Into<String>) -> Self {
        self.key_uri = Some(key_uri.into());
        self
    }
}

/// Parameters handed to the cryptographic module for one license request
#[derive(Debug, Clone, PartialEq)]
pub struct KeySystemParams {
    /// Asset the challenge will be bound to
    pub content_ref: ContentRef,
    /// Key system identifier, e.g. `com.widevine.alpha`
    pub key_system: String,
    /// License server endpoint
    pub license_server_url: String,
    /// Extra server parameters
    pub query_params: serde_json::Map<String, serde_json::Value>,
    /// Key URI identifying the key material
    pub uri: String,
}

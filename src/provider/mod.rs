//! Provider adapters
//!
//! Each streaming service is reached through a [`ProviderAdapter`] that
//! knows its endpoints and payload shapes. The resolver only sees asset
//! metadata and manifests.

pub mod hls;
pub mod registry;

use crate::{
    Result,
    types::{AssetMetadata, ContentRef, Manifest},
};

pub use hls::{HlsAdapter, parse_master_playlist};
pub use registry::ProviderRegistry;

/// Capability shared by every provider integration
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Name the adapter is registered under
    fn name(&self) -> &str;

    /// Fetch license and manifest locations for an asset
    async fn fetch_asset_metadata(&self, content_ref: &ContentRef) -> Result<AssetMetadata>;

    /// Fetch the manifest found at `manifest_url`
    async fn fetch_manifest(&self, content_ref: &ContentRef, manifest_url: &str)
    -> Result<Manifest>;
}

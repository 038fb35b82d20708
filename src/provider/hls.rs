//! HLS master playlist support

use crate::{
    Error, Result,
    network::ensure_success,
    provider::ProviderAdapter,
    types::{AssetMetadata, ContentRef, Manifest, StreamVariant},
};
use m3u8_rs::{KeyMethod, Playlist};
use reqwest::Client;
use tracing::debug;

/// Turn an HLS master playlist into a manifest
///
/// Relative variant URIs are resolved against `base_url`. Every variant is
/// marked as DRM-protected when the playlist declares a session key with a
/// method other than `NONE`. I-frame-only variants are skipped.
pub fn parse_master_playlist(
    content_ref: &ContentRef,
    base_url: &str,
    bytes: &[u8],
) -> Result<Manifest> {
    let master = match m3u8_rs::parse_playlist_res(bytes) {
        Ok(Playlist::MasterPlaylist(master)) => master,
        Ok(Playlist::MediaPlaylist(_)) => {
            return Err(Error::manifest("expected a master playlist, got a media playlist"));
        }
        Err(e) => return Err(Error::manifest(format!("failed to parse playlist: {:?}", e))),
    };

    let base = url::Url::parse(base_url)?;
    let drm_required = master
        .session_key
        .iter()
        .any(|session_key| !matches!(session_key.0.method, KeyMethod::None));

    let mut variants = Vec::with_capacity(master.variants.len());
    for (index, stream) in master.variants.iter().filter(|v| !v.is_i_frame).enumerate() {
        let uri = base.join(&stream.uri)?;

        let mut variant = StreamVariant::new(index.to_string(), stream.bandwidth, uri.as_str());
        if let Some(codecs) = &stream.codecs {
            variant = variant.with_codecs(codecs.split(',').map(str::trim));
        }
        if let Some(resolution) = &stream.resolution
            && let (Ok(width), Ok(height)) = (
                u32::try_from(resolution.width),
                u32::try_from(resolution.height),
            )
        {
            variant = variant.with_resolution(width, height);
        }
        variant.drm_required = drm_required;
        variants.push(variant);
    }

    debug!(
        "Parsed {} variants for {} (drm: {})",
        variants.len(),
        content_ref,
        drm_required
    );
    Ok(Manifest::new(content_ref.clone(), variants))
}

/// Adapter for plain HLS sources
///
/// The content reference is the master playlist URL itself and no license
/// server is involved.
#[derive(Debug, Clone)]
pub struct HlsAdapter {
    client: Client,
}

impl HlsAdapter {
    /// Create an adapter using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for HlsAdapter {
    fn name(&self) -> &str {
        "hls"
    }

    async fn fetch_asset_metadata(&self, content_ref: &ContentRef) -> Result<AssetMetadata> {
        url::Url::parse(content_ref.as_str())?;
        Ok(AssetMetadata::drm_free(content_ref.as_str()))
    }

    async fn fetch_manifest(
        &self,
        content_ref: &ContentRef,
        manifest_url: &str,
    ) -> Result<Manifest> {
        debug!("Fetching master playlist {}", manifest_url);
        let response = self.client.get(manifest_url).send().await?;
        let response = ensure_success(response, "manifest")?;
        let final_url = response.url().to_string();
        let bytes = response.bytes().await?;

        parse_master_playlist(content_ref, &final_url, &bytes)
    }
}

//! Resolution orchestrator
//!
//! Runs one resolution strictly in order: asset metadata, manifest,
//! selection, signature rewrite, license. The first failing stage ends the
//! resolution and its error is returned unchanged, tagged with the stage.

use crate::{
    Error,
    cipher::{CipherCache, SignatureResolver},
    config::{ResolveSettings, Settings},
    credentials::CredentialStore,
    error::{ResolveError, ResolveStage, format_resolve_error, format_resolve_error_for_logging},
    license::{CryptoModule, LicenseNegotiator},
    network::NetworkManager,
    provider::ProviderAdapter,
    select::{SelectionPolicy, select},
    types::{AssetMetadata, ContentKeys, ContentRef, Manifest, StreamLocation, StreamVariant},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Directly fetchable media URL
    pub url: String,
    /// Keys needed to decrypt the media, present for DRM variants
    pub content_keys: Option<ContentKeys>,
    /// The variant that was chosen
    pub variant: StreamVariant,
    /// Set when no variant met the bandwidth floor
    pub degraded: bool,
}

type StageResult<T> = std::result::Result<T, ResolveError>;

/// Composes provider, selector, signature resolver and license negotiator
pub struct ResolutionOrchestrator {
    provider: Arc<dyn ProviderAdapter>,
    credentials: Arc<dyn CredentialStore>,
    negotiator: LicenseNegotiator,
    signatures: Arc<SignatureResolver>,
    settings: ResolveSettings,
}

impl std::fmt::Debug for ResolutionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionOrchestrator")
            .field("provider", &self.provider.name())
            .field("negotiator", &self.negotiator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ResolutionOrchestrator {
    /// Create an orchestrator with default stage settings
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        credentials: Arc<dyn CredentialStore>,
        negotiator: LicenseNegotiator,
        signatures: Arc<SignatureResolver>,
    ) -> Self {
        Self {
            provider,
            credentials,
            negotiator,
            signatures,
            settings: ResolveSettings::default(),
        }
    }

    /// Replace the stage settings
    pub fn with_settings(mut self, settings: ResolveSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire every component from configuration
    ///
    /// The HTTP client, license negotiator and signature resolver (with its
    /// persisted programs) are built from `settings`.
    pub async fn from_settings(
        settings: &Settings,
        provider: Arc<dyn ProviderAdapter>,
        credentials: Arc<dyn CredentialStore>,
        module: Arc<dyn CryptoModule>,
    ) -> crate::Result<Self> {
        let network = NetworkManager::from_settings(&settings.network)?;
        let negotiator =
            LicenseNegotiator::from_settings(network.client_clone(), module, &settings.license);
        let signatures =
            SignatureResolver::from_settings(&settings.cipher, network.client_clone()).await?;

        Ok(Self::new(provider, credentials, negotiator, Arc::new(signatures))
            .with_settings(settings.resolve.clone()))
    }

    /// Cipher cache shared by every resolution of this orchestrator
    pub fn cipher_cache(&self) -> &Arc<CipherCache> {
        self.signatures.cache()
    }

    /// Signature resolver used for ciphered variants
    pub fn signatures(&self) -> &Arc<SignatureResolver> {
        &self.signatures
    }

    async fn run_stage<T, F>(&self, stage: ResolveStage, work: F) -> StageResult<T>
    where
        F: Future<Output = crate::Result<T>>,
    {
        debug!("Entering {} stage", stage);
        let secs = self.settings.stage_timeout;
        let result = if secs == 0 {
            work.await
        } else {
            match tokio::time::timeout(Duration::from_secs(secs), work).await {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(format!("{} stage", stage), secs)),
            }
        };

        result.map_err(|e| {
            let err = ResolveError::new(stage, e);
            warn!(
                details = %format_resolve_error_for_logging(&err),
                "{}",
                format_resolve_error(&err)
            );
            err
        })
    }

    /// Resolve a playable URL, and content keys for DRM variants
    ///
    /// No partial result is returned: if any stage fails the whole call
    /// fails with that stage's error.
    pub async fn resolve(
        &self,
        content_ref: &ContentRef,
        policy: &SelectionPolicy,
    ) -> StageResult<Resolution> {
        let metadata = self
            .run_stage(
                ResolveStage::Metadata,
                self.provider.fetch_asset_metadata(content_ref),
            )
            .await?;

        let manifest = self
            .run_stage(
                ResolveStage::Manifest,
                self.provider
                    .fetch_manifest(content_ref, &metadata.manifest_url),
            )
            .await?;

        let selection = select(&manifest, policy)
            .map_err(|e| ResolveError::new(ResolveStage::Selection, e))?;
        let degraded = selection.degraded;
        let variant = selection.into_best().ok_or_else(|| {
            ResolveError::new(
                ResolveStage::Selection,
                Error::no_variant("selection returned no variant"),
            )
        })?;
        debug!("Selected variant {} ({} bps)", variant.id, variant.bandwidth);

        let url = self.playable_url(&manifest, &variant).await?;

        let content_keys = if variant.drm_required {
            Some(self.content_keys(content_ref, &metadata, &variant).await?)
        } else {
            None
        };

        info!(
            "Resolved {} to variant {} (drm: {}, degraded: {})",
            content_ref, variant.id, variant.drm_required, degraded
        );
        Ok(Resolution {
            url,
            content_keys,
            variant,
            degraded,
        })
    }

    async fn playable_url(&self, manifest: &Manifest, variant: &StreamVariant) -> StageResult<String> {
        match &variant.location {
            StreamLocation::Direct { url } => Ok(url.clone()),
            StreamLocation::Ciphered(cipher) => {
                let version = manifest.cipher_version.as_deref().ok_or_else(|| {
                    ResolveError::new(
                        ResolveStage::Cipher,
                        Error::manifest(format!(
                            "variant {} of {} is ciphered but the manifest has no player version",
                            variant.id, manifest.content_ref
                        )),
                    )
                })?;
                self.run_stage(ResolveStage::Cipher, self.signatures.decipher(version, cipher))
                    .await
            }
        }
    }

    async fn content_keys(
        &self,
        content_ref: &ContentRef,
        metadata: &AssetMetadata,
        variant: &StreamVariant,
    ) -> StageResult<ContentKeys> {
        let request = self
            .negotiator
            .build(content_ref, metadata)
            .map_err(|e| ResolveError::new(ResolveStage::License, e))?;

        let first = self
            .run_stage(
                ResolveStage::License,
                self.negotiator.run(request.clone(), self.credentials.as_ref()),
            )
            .await;

        let keys = match first {
            Err(err) if self.settings.refresh_on_unauthorized && err.error().needs_refresh() => {
                info!("License server rejected credentials, refreshing once");
                self.run_stage(ResolveStage::License, async {
                    self.credentials.refresh().await?;
                    self.negotiator
                        .run(request, self.credentials.as_ref())
                        .await
                })
                .await?
            }
            other => other?,
        };

        if keys.is_empty() {
            return Err(ResolveError::new(
                ResolveStage::License,
                Error::license_decode(format!(
                    "license for DRM variant {} carried no content keys",
                    variant.id
                )),
            ));
        }

        let missing = keys.missing(&variant.key_ids);
        if !missing.is_empty() {
            return Err(ResolveError::new(
                ResolveStage::License,
                Error::MissingContentKeys { missing },
            ));
        }
        Ok(keys)
    }
}

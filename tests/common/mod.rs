//! Common test utilities and helpers
//!
//! Mock collaborators for the resolver seams plus wiremock fixtures for the
//! license server and player script endpoints.

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stream_resolver::{
    CipherCache, ContentKeys, ContentRef, CredentialStore, LicenseNegotiator, Manifest,
    ProviderAdapter, ResolutionOrchestrator, Result, SignatureResolver, StreamVariant,
    cipher::HttpPlayerScriptFetcher,
    config::ResolveSettings,
    license::CryptoModule,
    types::{
        AccessToken, AssetMetadata, Challenge, KeySystemParams, LicenseResponse, SignatureCipher,
    },
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHALLENGE: &[u8] = b"mock-challenge";
pub const LICENSE: &[u8] = b"mock-license";
pub const KID: &str = "0123456789abcdef0123456789abcdef";
pub const KEY: &[u8] = &[0xaa; 16];
pub const LICENSE_PATH: &str = "/license";

/// Cryptographic module returning fixed bytes
///
/// Decoding only succeeds for [`LICENSE`] and yields one key per configured
/// key-ID.
pub struct MockModule {
    kids: Vec<String>,
    pub challenges: AtomicUsize,
}

impl MockModule {
    pub fn new() -> Self {
        Self::with_kids(&[KID])
    }

    pub fn with_kids(kids: &[&str]) -> Self {
        Self {
            kids: kids.iter().map(|kid| kid.to_string()).collect(),
            challenges: AtomicUsize::new(0),
        }
    }

    pub fn challenge_count(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }
}

impl CryptoModule for MockModule {
    fn generate_challenge(&self, _params: &KeySystemParams) -> anyhow::Result<Challenge> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        Ok(Challenge(CHALLENGE.to_vec()))
    }

    fn decode_license(&self, response: &LicenseResponse) -> anyhow::Result<ContentKeys> {
        anyhow::ensure!(response.as_bytes() == LICENSE, "unexpected license bytes");
        let mut keys = ContentKeys::new();
        for kid in &self.kids {
            keys.insert_hex(kid, KEY.to_vec());
        }
        Ok(keys)
    }
}

/// Provider adapter serving fixed metadata and manifest
pub struct MockProvider {
    metadata: AssetMetadata,
    manifest: Manifest,
    delay: Option<Duration>,
    pub manifest_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(metadata: AssetMetadata, manifest: Manifest) -> Self {
        Self {
            metadata,
            manifest,
            delay: None,
            manifest_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every manifest fetch
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_asset_metadata(&self, _content_ref: &ContentRef) -> Result<AssetMetadata> {
        Ok(self.metadata.clone())
    }

    async fn fetch_manifest(&self, _content_ref: &ContentRef, _manifest_url: &str) -> Result<Manifest> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.manifest.clone())
    }
}

/// Credential store counting refreshes
///
/// Starts with `initial` and hands out `refreshed` after the first refresh.
pub struct RotatingCredentials {
    current: tokio::sync::RwLock<AccessToken>,
    refreshed: AccessToken,
    pub refreshes: AtomicUsize,
}

impl RotatingCredentials {
    pub fn new(initial: &str, refreshed: &str) -> Self {
        Self {
            current: tokio::sync::RwLock::new(AccessToken::new(initial)),
            refreshed: AccessToken::new(refreshed),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialStore for RotatingCredentials {
    async fn current_token(&self) -> Result<AccessToken> {
        Ok(self.current.read().await.clone())
    }

    async fn refresh(&self) -> Result<AccessToken> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.current.write().await = self.refreshed.clone();
        Ok(self.refreshed.clone())
    }
}

/// Test data factory
pub struct MockData;

impl MockData {
    pub fn content_ref() -> ContentRef {
        ContentRef::new("asset-42")
    }

    /// JSON envelope carrying [`LICENSE`]
    pub fn license_envelope() -> serde_json::Value {
        serde_json::json!({ "license": STANDARD.encode(LICENSE) })
    }

    pub fn metadata(server: &MockServer) -> AssetMetadata {
        let mut params = serde_json::Map::new();
        params.insert("adamId".to_string(), serde_json::json!("1234"));
        AssetMetadata::drm_free("https://cdn.example/master.m3u8")
            .with_license(format!("{}{}", server.uri(), LICENSE_PATH), params)
            .with_key_uri("data:text/plain;base64,AAAA")
    }

    /// Variant 1: 500 bps DRM-free. Variant 2: 2000 bps with DRM.
    pub fn two_variant_manifest() -> Manifest {
        Manifest::new(
            Self::content_ref(),
            vec![
                StreamVariant::new("1", 500, "https://cdn.example/v1.m3u8"),
                StreamVariant::new("2", 2000, "https://cdn.example/v2.m3u8")
                    .with_drm(vec![KID.to_string()]),
            ],
        )
    }

    pub fn ciphered_manifest(version: &str) -> Manifest {
        let cipher = SignatureCipher {
            url: "https://media.example/videoplayback?itag=22".to_string(),
            sp: "sig".to_string(),
            s: "xyzabc".to_string(),
        };
        Manifest::new(
            Self::content_ref(),
            vec![StreamVariant::new("22", 1500, "").with_cipher(cipher)],
        )
        .with_cipher_version(version)
    }
}

/// Player script whose transform drops one char and reverses the rest
pub const SUPPORTED_PLAYER: &str = r#"var Mt={rv:function(a){a.reverse()},sp:function(a,b){a.splice(0,b)}};
Qt=function(a){a=a.split("");Mt.sp(a,1);Mt.rv(a,2);return a.join("")};"#;

/// Player script calling a helper that is not a known transform
pub const UNSUPPORTED_PLAYER: &str = r#"var Mt={rv:function(a){a.reverse()},px:function(a,b){a.push(b)}};
Qt=function(a){a=a.split("");Mt.rv(a,1);Mt.px(a,9);return a.join("")};"#;

/// Mount a license server answering with the JSON envelope
pub async fn mount_license_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LICENSE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockData::license_envelope()))
        .mount(server)
        .await;
}

/// Mount a player script for `version`
pub async fn mount_player(server: &MockServer, version: &str, script: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/s/player/{}/base.js", version)))
        .respond_with(ResponseTemplate::new(200).set_body_string(script))
        .mount(server)
        .await;
}

pub fn player_template(server: &MockServer) -> String {
    format!("{}/s/player/{{version}}/base.js", server.uri())
}

/// Signature resolver fetching player scripts from `server`
pub fn signature_resolver(server: &MockServer) -> Arc<SignatureResolver> {
    let fetcher = HttpPlayerScriptFetcher::new(Client::new(), player_template(server));
    Arc::new(
        SignatureResolver::new(Arc::new(CipherCache::new()), Arc::new(fetcher))
            .expect("resolver patterns compile"),
    )
}

/// Orchestrator wired to `server` for license and player script requests
pub fn orchestrator(
    server: &MockServer,
    provider: Arc<dyn ProviderAdapter>,
    credentials: Arc<dyn CredentialStore>,
    module: Arc<dyn CryptoModule>,
    settings: ResolveSettings,
) -> ResolutionOrchestrator {
    let negotiator = LicenseNegotiator::new(Client::new(), module);
    ResolutionOrchestrator::new(provider, credentials, negotiator, signature_resolver(server))
        .with_settings(settings)
}

//! License negotiation
//!
//! A negotiation moves through
//! `Built -> ChallengeGenerated -> Submitted -> Decoded` and ends with
//! either content keys or the error of the step that failed. Each step is a
//! separate type so a step cannot be skipped or repeated on the same
//! request. The negotiator never retries: callers decide whether to refresh
//! credentials and start over.

use crate::{
    Error, Result,
    config::{LicenseResponseFormat, LicenseSettings},
    credentials::CredentialStore,
    license::{CryptoModule, LicenseRequestBody, decode_response_body},
    network::ensure_success,
    types::{AssetMetadata, Challenge, ContentKeys, ContentRef, KeySystemParams, LicenseResponse},
};
use reqwest::{
    Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Step a negotiation reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Parameters assembled from asset metadata
    Built,
    /// Challenge produced by the cryptographic module
    ChallengeGenerated,
    /// License server answered
    Submitted,
    /// License decoded into content keys
    Decoded,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Built => "built",
            NegotiationState::ChallengeGenerated => "challenge_generated",
            NegotiationState::Submitted => "submitted",
            NegotiationState::Decoded => "decoded",
        };
        f.write_str(name)
    }
}

/// License request in the `Built` state
#[derive(Debug, Clone)]
pub struct LicenseRequest {
    params: KeySystemParams,
}

impl LicenseRequest {
    /// Build a request from asset metadata
    ///
    /// Fails with `InvalidAsset` when the asset has no license server, which
    /// means it is DRM-free.
    pub fn build(
        content_ref: &ContentRef,
        key_system: impl Into<String>,
        metadata: &AssetMetadata,
    ) -> Result<Self> {
        let license_server_url = metadata
            .license_server_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::invalid_asset(content_ref.as_str(), "asset has no license server URL")
            })?;

        Ok(Self {
            params: KeySystemParams {
                content_ref: content_ref.clone(),
                key_system: key_system.into(),
                license_server_url: license_server_url.clone(),
                query_params: metadata.license_query_params.clone().unwrap_or_default(),
                uri: metadata.key_uri.clone().unwrap_or_default(),
            },
        })
    }

    /// Request from already assembled parameters
    pub fn from_params(params: KeySystemParams) -> Self {
        Self { params }
    }

    /// Parameters the request was built with
    pub fn params(&self) -> &KeySystemParams {
        &self.params
    }

    /// Current step
    pub fn state(&self) -> NegotiationState {
        NegotiationState::Built
    }

    /// Ask the module for a challenge
    pub fn generate_challenge(self, module: &dyn CryptoModule) -> Result<ChallengedLicense> {
        let challenge = module.generate_challenge(&self.params).map_err(|e| {
            error!("Challenge generation failed for {}: {:#}", self.params.content_ref, e);
            Error::module(format!("{:#}", e))
        })?;

        debug!(
            "Generated {} byte challenge for {}",
            challenge.as_bytes().len(),
            self.params.content_ref
        );
        Ok(ChallengedLicense {
            params: self.params,
            challenge,
        })
    }
}

/// License request in the `ChallengeGenerated` state
#[derive(Debug, Clone)]
pub struct ChallengedLicense {
    params: KeySystemParams,
    challenge: Challenge,
}

impl ChallengedLicense {
    /// The generated challenge
    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    /// Current step
    pub fn state(&self) -> NegotiationState {
        NegotiationState::ChallengeGenerated
    }

    /// JSON body sent to the license server
    pub fn body(&self) -> LicenseRequestBody {
        LicenseRequestBody {
            challenge: self.challenge.0.clone(),
            extra_server_parameters: self.params.query_params.clone(),
            key_system: self.params.key_system.clone(),
            uri: self.params.uri.clone(),
        }
    }

    /// POST the challenge to the license server
    ///
    /// The bearer token and optional user token are read from `credentials`.
    /// An invalid token fails with `Unauthorized` before any request is made.
    pub async fn submit(
        self,
        client: &Client,
        credentials: &dyn CredentialStore,
        format: LicenseResponseFormat,
    ) -> Result<SubmittedLicense> {
        let token = credentials.current_token().await?;
        if !token.is_valid() {
            return Err(Error::Unauthorized {
                reason: "access token is empty or expired".to_string(),
                endpoint: Some(self.params.license_server_url.clone()),
            });
        }

        let mut request = client
            .post(&self.params.license_server_url)
            .header(AUTHORIZATION, format!("Bearer {}", token.value))
            .header(CONTENT_TYPE, "application/json")
            .json(&self.body());

        if let Some(user_token) = credentials.user_token().await? {
            request = request.header(user_token.header.as_str(), user_token.value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            error!("Failed to send license request: {}", e);
            Error::from(e)
        })?;
        let response = ensure_success(response, "license server")?;
        let body = response.bytes().await?;

        debug!("License server returned {} bytes", body.len());
        Ok(SubmittedLicense {
            content_ref: self.params.content_ref,
            response: decode_response_body(&body, format)?,
        })
    }
}

/// License request in the `Submitted` state
#[derive(Debug, Clone)]
pub struct SubmittedLicense {
    content_ref: ContentRef,
    response: LicenseResponse,
}

impl SubmittedLicense {
    /// License bytes as returned by the server
    pub fn response(&self) -> &LicenseResponse {
        &self.response
    }

    /// Current step
    pub fn state(&self) -> NegotiationState {
        NegotiationState::Submitted
    }

    /// Hand the license to the module and recover the content keys
    pub fn decode(self, module: &dyn CryptoModule) -> Result<ContentKeys> {
        let keys = module.decode_license(&self.response).map_err(|e| {
            error!("License decode failed for {}: {:#}", self.content_ref, e);
            Error::license_decode(format!("{:#}", e))
        })?;

        info!("Decoded {} content keys for {}", keys.len(), self.content_ref);
        Ok(keys)
    }
}

/// Runs the full license exchange for one asset at a time
#[derive(Clone)]
pub struct LicenseNegotiator {
    client: Client,
    module: Arc<dyn CryptoModule>,
    key_system: String,
    response_format: LicenseResponseFormat,
}

impl fmt::Debug for LicenseNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseNegotiator")
            .field("key_system", &self.key_system)
            .field("response_format", &self.response_format)
            .finish_non_exhaustive()
    }
}

impl LicenseNegotiator {
    /// Create a negotiator using the widevine key system and JSON envelope
    pub fn new(client: Client, module: Arc<dyn CryptoModule>) -> Self {
        Self::from_settings(client, module, &LicenseSettings::default())
    }

    /// Create a negotiator from license settings
    pub fn from_settings(
        client: Client,
        module: Arc<dyn CryptoModule>,
        settings: &LicenseSettings,
    ) -> Self {
        Self {
            client,
            module,
            key_system: settings.key_system.clone(),
            response_format: settings.response_format,
        }
    }

    /// Key system sent with each request
    pub fn key_system(&self) -> &str {
        &self.key_system
    }

    /// Build a request for `content_ref` from its metadata
    pub fn build(&self, content_ref: &ContentRef, metadata: &AssetMetadata) -> Result<LicenseRequest> {
        LicenseRequest::build(content_ref, self.key_system.clone(), metadata)
    }

    /// Run every step for an already built request
    pub async fn run(
        &self,
        request: LicenseRequest,
        credentials: &dyn CredentialStore,
    ) -> Result<ContentKeys> {
        let challenged = request.generate_challenge(self.module.as_ref())?;
        let submitted = challenged
            .submit(&self.client, credentials, self.response_format)
            .await?;
        submitted.decode(self.module.as_ref())
    }

    /// Negotiate content keys for an asset
    pub async fn negotiate(
        &self,
        content_ref: &ContentRef,
        metadata: &AssetMetadata,
        credentials: &dyn CredentialStore,
    ) -> Result<ContentKeys> {
        let request = self.build(content_ref, metadata)?;
        self.run(request, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::types::{AccessToken, UserToken};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Echoes the challenge back as a single key
    struct EchoModule;

    impl CryptoModule for EchoModule {
        fn generate_challenge(&self, params: &KeySystemParams) -> anyhow::Result<Challenge> {
            Ok(Challenge(params.content_ref.as_str().as_bytes().to_vec()))
        }

        fn decode_license(&self, response: &LicenseResponse) -> anyhow::Result<ContentKeys> {
            let mut keys = ContentKeys::new();
            keys.insert(&[0x01; 16], response.0.clone());
            Ok(keys)
        }
    }

    struct BrokenModule;

    impl CryptoModule for BrokenModule {
        fn generate_challenge(&self, _params: &KeySystemParams) -> anyhow::Result<Challenge> {
            anyhow::bail!("malformed device credentials")
        }

        fn decode_license(&self, _response: &LicenseResponse) -> anyhow::Result<ContentKeys> {
            anyhow::bail!("license signature mismatch")
        }
    }

    fn metadata(server: &str) -> AssetMetadata {
        let mut params = serde_json::Map::new();
        params.insert("adamId".to_string(), serde_json::json!("42"));
        AssetMetadata::drm_free(format!("{}/master.m3u8", server))
            .with_license(format!("{}/license", server), params)
            .with_key_uri("data:text/plain;base64,AAAA")
    }

    #[test]
    fn test_build_requires_license_server() {
        let err = LicenseRequest::build(
            &ContentRef::new("c1"),
            "com.widevine.alpha",
            &AssetMetadata::drm_free("https://cdn.example/master.m3u8"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAsset { .. }));
    }

    #[test]
    fn test_build_defaults_missing_params() {
        let metadata = AssetMetadata {
            license_server_url: Some("https://license.example".to_string()),
            ..AssetMetadata::default()
        };
        let request =
            LicenseRequest::build(&ContentRef::new("c1"), "com.widevine.alpha", &metadata).unwrap();

        assert!(request.params().query_params.is_empty());
        assert_eq!(request.params().uri, "");
        assert_eq!(request.state(), NegotiationState::Built);
    }

    #[test]
    fn test_module_failure() {
        let request = LicenseRequest::build(
            &ContentRef::new("c1"),
            "com.widevine.alpha",
            &metadata("https://license.example"),
        )
        .unwrap();

        let err = request.generate_challenge(&BrokenModule).unwrap_err();
        match err {
            Error::Module { message } => assert!(message.contains("malformed device credentials")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_negotiation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/license"))
            .and(header("authorization", "Bearer token-1"))
            .and(header("media-user-token", "user-1"))
            .and(body_json(serde_json::json!({
                "challenge": "YzE=",
                "extra-server-parameters": {"adamId": "42"},
                "key-system": "com.widevine.alpha",
                "uri": "data:text/plain;base64,AAAA"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "license": "AAECAw=="
            })))
            .expect(1)
            .mount(&server)
            .await;

        let negotiator = LicenseNegotiator::new(Client::new(), Arc::new(EchoModule));
        let credentials = StaticCredentials::new(AccessToken::new("token-1"))
            .with_user_token(UserToken::new("media-user-token", "user-1"));

        let keys = negotiator
            .negotiate(&ContentRef::new("c1"), &metadata(&server.uri()), &credentials)
            .await
            .unwrap();

        assert_eq!(keys.get(&hex::encode([0x01; 16])), Some(&[0u8, 1, 2, 3][..]));
    }

    #[tokio::test]
    async fn test_expired_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let negotiator = LicenseNegotiator::new(Client::new(), Arc::new(EchoModule));
        let credentials = StaticCredentials::new(
            AccessToken::new("old").expiring_at(chrono::Utc::now() - chrono::Duration::minutes(1)),
        );

        let err = negotiator
            .negotiate(&ContentRef::new("c1"), &metadata(&server.uri()), &credentials)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "license": "AAECAw=="
            })))
            .mount(&server)
            .await;

        let request = LicenseRequest::build(
            &ContentRef::new("c1"),
            "com.widevine.alpha",
            &metadata(&server.uri()),
        )
        .unwrap();
        let credentials = StaticCredentials::new(AccessToken::new("t"));

        let challenged = request.generate_challenge(&EchoModule).unwrap();
        assert_eq!(challenged.state(), NegotiationState::ChallengeGenerated);

        let submitted = challenged
            .submit(&Client::new(), &credentials, LicenseResponseFormat::Json)
            .await
            .unwrap();
        assert_eq!(submitted.state(), NegotiationState::Submitted);
        assert_eq!(submitted.response().as_bytes(), &[0, 1, 2, 3]);

        let err = submitted.decode(&BrokenModule).unwrap_err();
        assert!(matches!(err, Error::LicenseDecode { .. }));
    }
}

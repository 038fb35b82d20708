//! HTTP client configuration
//!
//! Builds the shared `reqwest` client used by the license negotiator, the
//! player script fetcher and the HLS adapter.

use crate::{Result, config::NetworkSettings};
use reqwest::{Client, Proxy, Response, header::RETRY_AFTER};
use std::time::Duration;
use tracing::{debug, error};

/// Network manager owning the configured HTTP client
#[derive(Debug, Clone)]
pub struct NetworkManager {
    client: Client,
}

impl NetworkManager {
    /// Create the client from network settings
    ///
    /// The proxy is the one returned by [`NetworkSettings::proxy_url`].
    pub fn from_settings(settings: &NetworkSettings) -> Result<Self> {
        let mut client_builder = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .connect_timeout(Duration::from_secs(settings.connect_timeout))
            .timeout(Duration::from_secs(settings.request_timeout));

        if let Some(proxy_url) = settings.proxy_url() {
            debug!("Using proxy {}", proxy_url);
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                crate::Error::config("proxy", &format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(|e| {
            crate::Error::config(
                "client_builder",
                &format!("Failed to create HTTP client: {}", e),
            )
        })?;

        Ok(Self { client })
    }

    /// Get the configured HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Clone of the configured HTTP client
    pub fn client_clone(&self) -> Client {
        self.client.clone()
    }
}

/// Turn a non-success response into the matching error kind
pub(crate) fn ensure_success(response: Response, endpoint: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    error!("{} returned error status: {}", endpoint, status);
    Err(crate::Error::from_status(status, retry_after, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_manager_creation() {
        let settings = NetworkSettings::default();
        let manager = NetworkManager::from_settings(&settings);
        assert!(manager.is_ok());
    }

    #[test]
    fn test_network_manager_with_proxy() {
        let settings = NetworkSettings {
            http_proxy: Some("http://proxy.example.com:8080".to_string()),
            ..NetworkSettings::default()
        };
        let manager = NetworkManager::from_settings(&settings);
        assert!(manager.is_ok());
    }

    #[test]
    fn test_network_manager_invalid_proxy() {
        let settings = NetworkSettings {
            all_proxy: Some("http://[::1".to_string()),
            ..NetworkSettings::default()
        };
        let manager = NetworkManager::from_settings(&settings);
        assert!(matches!(manager, Err(crate::Error::Config { .. })));
    }

    #[test]
    fn test_network_manager_uses_highest_priority_proxy() {
        // The malformed all_proxy is never parsed while https_proxy is set
        let mut settings = NetworkSettings {
            https_proxy: Some("http://proxy.example.com:8443".to_string()),
            all_proxy: Some("http://[::1".to_string()),
            ..NetworkSettings::default()
        };
        assert!(NetworkManager::from_settings(&settings).is_ok());

        settings.https_proxy = None;
        assert!(matches!(
            NetworkManager::from_settings(&settings),
            Err(crate::Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_success_maps_status() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let response = reqwest::get(server.uri()).await.unwrap();
        let err = ensure_success(response, "test").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::RateLimited {
                retry_after: Some(7),
                ..
            }
        ));
    }
}

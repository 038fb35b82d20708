//! Signature resolution
//!
//! Combines the [`CipherCache`], a [`PlayerScriptFetcher`] and the
//! [`OperationResolver`] so callers can decipher a signature knowing only
//! the content version.

use crate::{
    Result,
    cipher::{CipherCache, CipherProgram, OperationResolver},
    config::CipherSettings,
    network::ensure_success,
    types::SignatureCipher,
    utils::cache::FileCache,
};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

/// Supplies the obfuscated player logic for a content version
#[async_trait::async_trait]
pub trait PlayerScriptFetcher: Send + Sync {
    /// Fetch the raw player script text for `version`
    async fn fetch_player_script(&self, version: &str) -> Result<String>;
}

/// Fetches player scripts over HTTP from a URL template
#[derive(Debug, Clone)]
pub struct HttpPlayerScriptFetcher {
    client: Client,
    url_template: String,
}

impl HttpPlayerScriptFetcher {
    /// Create a fetcher; `{version}` in the template is replaced per request
    pub fn new(client: Client, url_template: impl Into<String>) -> Self {
        Self {
            client,
            url_template: url_template.into(),
        }
    }

    /// URL the script for `version` is fetched from
    pub fn script_url(&self, version: &str) -> String {
        self.url_template.replace("{version}", version)
    }
}

#[async_trait::async_trait]
impl PlayerScriptFetcher for HttpPlayerScriptFetcher {
    async fn fetch_player_script(&self, version: &str) -> Result<String> {
        let url = self.script_url(version);
        debug!("Fetching player script from {}", url);

        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response, "player script")?;
        Ok(response.text().await?)
    }
}

/// Deciphers signatures, deriving each version's program at most once
pub struct SignatureResolver {
    cache: Arc<CipherCache>,
    fetcher: Arc<dyn PlayerScriptFetcher>,
    parser: OperationResolver,
}

impl std::fmt::Debug for SignatureResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SignatureResolver {
    /// Create a resolver over a shared cache
    pub fn new(cache: Arc<CipherCache>, fetcher: Arc<dyn PlayerScriptFetcher>) -> Result<Self> {
        Ok(Self {
            cache,
            fetcher,
            parser: OperationResolver::new()?,
        })
    }

    /// Create a resolver from settings
    ///
    /// Programs persisted in the configured cache file are loaded into the
    /// new cache.
    pub async fn from_settings(settings: &CipherSettings, client: Client) -> Result<Self> {
        let cache = Arc::new(match settings.max_entries {
            Some(max) => CipherCache::with_capacity(max),
            None => CipherCache::new(),
        });

        if let Some(path) = &settings.cache_file {
            let programs = FileCache::new(path.clone()).load_programs().await?;
            cache.preload(programs).await;
        }

        let fetcher = HttpPlayerScriptFetcher::new(client, settings.player_url_template.clone());
        Self::new(cache, Arc::new(fetcher))
    }

    /// The shared cache
    pub fn cache(&self) -> &Arc<CipherCache> {
        &self.cache
    }

    /// Program for `version`, fetched and derived on first use
    pub async fn program(&self, version: &str) -> Result<Arc<CipherProgram>> {
        self.cache
            .get_or_derive(version, move || async move {
                let script = self.fetcher.fetch_player_script(version).await?;
                self.parser.resolve(version, &script)
            })
            .await
    }

    /// Number of derivations performed so far
    pub fn derivations(&self) -> usize {
        self.cache.derivations()
    }

    /// Decipher `cipher` and return the playable URL
    pub async fn decipher(&self, version: &str, cipher: &SignatureCipher) -> Result<String> {
        let program = self.program(version).await?;
        let signature = program.apply(&cipher.s);

        let mut url = url::Url::parse(&cipher.url)?;
        url.query_pairs_mut().append_pair(&cipher.sp, &signature);

        info!("Deciphered signature with player {}", version);
        Ok(url.into())
    }

    /// Persist every cached program to `file`
    pub async fn save(&self, file: &FileCache) -> Result<()> {
        file.save_programs(&self.cache.snapshot().await).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherOp;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PLAYER: &str = r#"var Mt={rv:function(a){a.reverse()},sp:function(a,b){a.splice(0,b)}};
Qt=function(a){a=a.split("");Mt.sp(a,1);Mt.rv(a,2);return a.join("")};"#;

    struct StaticFetcher {
        script: String,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PlayerScriptFetcher for StaticFetcher {
        async fn fetch_player_script(&self, _version: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.script.clone())
        }
    }

    fn resolver(script: &str) -> (SignatureResolver, Arc<StaticFetcher>) {
        let fetcher = Arc::new(StaticFetcher {
            script: script.to_string(),
            calls: AtomicUsize::new(0),
        });
        let resolver = SignatureResolver::new(Arc::new(CipherCache::new()), fetcher.clone()).unwrap();
        (resolver, fetcher)
    }

    #[tokio::test]
    async fn test_decipher_appends_signature() {
        let (resolver, _) = resolver(PLAYER);
        let cipher = SignatureCipher {
            url: "https://r1.example/videoplayback?itag=22".to_string(),
            sp: "sig".to_string(),
            s: "xabc".to_string(),
        };

        let url = resolver.decipher("v1", &cipher).await.unwrap();
        assert_eq!(url, "https://r1.example/videoplayback?itag=22&sig=cba");
    }

    #[tokio::test]
    async fn test_program_fetched_once_per_version() {
        let (resolver, fetcher) = resolver(PLAYER);

        let first = resolver.program("v1").await.unwrap();
        let second = resolver.program("v1").await.unwrap();
        resolver.program("v2").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.ops, vec![CipherOp::Splice(1), CipherOp::Reverse]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.derivations(), 2);
    }

    #[tokio::test]
    async fn test_cached_program_skips_fetch() {
        let (resolver, fetcher) = resolver("not a player");
        resolver
            .cache()
            .put(CipherProgram::new("v1", vec![CipherOp::Reverse]))
            .await;

        assert_eq!(resolver.program("v1").await.unwrap().ops, vec![CipherOp::Reverse]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_http_fetcher_uses_template() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s/player/abc123/base.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYER))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpPlayerScriptFetcher::new(
            Client::new(),
            format!("{}/s/player/{{version}}/base.js", server.uri()),
        );
        let script = fetcher.fetch_player_script("abc123").await.unwrap();
        assert_eq!(script, PLAYER);
    }

    #[tokio::test]
    async fn test_from_settings_preloads_cache_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("programs.json");
        FileCache::new(path.clone())
            .save_programs(&[CipherProgram::new("v9", vec![CipherOp::Swap(2)])])
            .await
            .unwrap();

        let settings = CipherSettings {
            cache_file: Some(path),
            ..CipherSettings::default()
        };
        let resolver = SignatureResolver::from_settings(&settings, Client::new())
            .await
            .unwrap();

        let program = resolver.program("v9").await.unwrap();
        assert_eq!(program.ops, vec![CipherOp::Swap(2)]);
        assert_eq!(resolver.derivations(), 0);
    }
}

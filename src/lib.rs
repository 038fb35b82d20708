//! Stream Resolver
//!
//! Resolves a directly fetchable media URL from access-controlled or
//! obfuscated streaming sources.
//!
//! # Features
//!
//! - **License Exchange**: Challenge generation, submission and decoding
//!   against a provider's license server, with the cryptographic module kept
//!   behind a trait
//! - **Signature Ciphers**: Transform programs recovered from player logic,
//!   derived once per content version and shared across resolutions
//! - **Stream Selection**: Policy-driven ranking of manifest variants with
//!   graceful bandwidth degradation
//! - **Provider Adapters**: One trait per service integration, plus a ready
//!   HLS master playlist adapter
//!
//! # Architecture
//!
//! A resolution runs metadata, manifest, selection, cipher and license
//! stages in order. The [`ResolutionOrchestrator`] owns the components and
//! reports the first failing stage with its original error.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use stream_resolver::{
//!     ConfigLoader, ContentRef, ResolutionOrchestrator, SelectionPolicy,
//!     credentials::StaticCredentials,
//!     license::CryptoModule,
//!     network::NetworkManager,
//!     provider::HlsAdapter,
//!     types::{AccessToken, Challenge, ContentKeys, KeySystemParams, LicenseResponse},
//! };
//!
//! struct Device;
//!
//! impl CryptoModule for Device {
//!     fn generate_challenge(&self, _: &KeySystemParams) -> anyhow::Result<Challenge> {
//!         anyhow::bail!("no device configured")
//!     }
//!
//!     fn decode_license(&self, _: &LicenseResponse) -> anyhow::Result<ContentKeys> {
//!         anyhow::bail!("no device configured")
//!     }
//! }
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = ConfigLoader::new().load(None)?;
//! let client = NetworkManager::from_settings(&settings.network)?.client_clone();
//! let orchestrator = ResolutionOrchestrator::from_settings(
//!     &settings,
//!     Arc::new(HlsAdapter::new(client)),
//!     Arc::new(StaticCredentials::new(AccessToken::new("token"))),
//!     Arc::new(Device),
//! )
//! .await?;
//!
//! let resolution = orchestrator
//!     .resolve(
//!         &ContentRef::new("https://cdn.example/master.m3u8"),
//!         &SelectionPolicy::from(&settings.selection),
//!     )
//!     .await?;
//! println!("{}", resolution.url);
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod credentials;
pub mod error;
pub mod license;
pub mod network;
pub mod provider;
pub mod resolve;
pub mod select;
pub mod types;
pub mod utils;

pub use cipher::{CipherCache, CipherProgram, SignatureResolver};
pub use config::{ConfigLoader, Settings};
pub use credentials::{CredentialStore, StaticCredentials};
pub use error::{Error, ResolveError, ResolveStage, Result};
pub use license::{CryptoModule, LicenseNegotiator};
pub use provider::{ProviderAdapter, ProviderRegistry};
pub use resolve::{Resolution, ResolutionOrchestrator};
pub use select::{Selection, SelectionPolicy};
pub use types::{ContentKeys, ContentRef, Manifest, StreamVariant};

//! Signature cipher resolution
//!
//! Derives the transform program hidden in a player script, caches it per
//! content version and applies it to obfuscated signatures.

pub mod cache;
pub mod parser;
pub mod program;
pub mod resolver;

pub use cache::CipherCache;
pub use parser::OperationResolver;
pub use program::{CipherOp, CipherProgram};
pub use resolver::{HttpPlayerScriptFetcher, PlayerScriptFetcher, SignatureResolver};

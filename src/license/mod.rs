//! DRM license exchange
//!
//! Gets a challenge from the cryptographic module, submits it to the
//! provider's license server and turns the answer into content keys.

pub mod module;
pub mod negotiator;
pub mod request;

pub use module::CryptoModule;
pub use negotiator::{
    ChallengedLicense, LicenseNegotiator, LicenseRequest, NegotiationState, SubmittedLicense,
};
pub use request::{LicenseRequestBody, decode_response_body};

//! License exchange wire format
//!
//! The outbound body is the one wire contract the resolver owns:
//!
//! ```json
//! {
//!   "challenge": "<base64>",
//!   "extra-server-parameters": { ... },
//!   "key-system": "com.widevine.alpha",
//!   "uri": "data:text/plain;base64,..."
//! }
//! ```

use crate::{Error, Result, config::LicenseResponseFormat, types::LicenseResponse};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// JSON body posted to a license server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRequestBody {
    /// Challenge bytes
    #[serde(with = "base64_bytes")]
    pub challenge: Vec<u8>,
    /// Provider-supplied parameters forwarded verbatim
    #[serde(rename = "extra-server-parameters")]
    pub extra_server_parameters: serde_json::Map<String, serde_json::Value>,
    /// Key system identifier
    #[serde(rename = "key-system")]
    pub key_system: String,
    /// Key URI
    pub uri: String,
}

#[derive(Debug, Deserialize)]
struct LicenseEnvelope {
    #[serde(alias = "License")]
    license: String,
}

/// Extract license bytes from a response body
pub fn decode_response_body(body: &[u8], format: LicenseResponseFormat) -> Result<LicenseResponse> {
    match format {
        LicenseResponseFormat::Raw => Ok(LicenseResponse(body.to_vec())),
        LicenseResponseFormat::Json => {
            let envelope: LicenseEnvelope = serde_json::from_slice(body)
                .map_err(|e| Error::license_decode(format!("invalid license envelope: {}", e)))?;
            let bytes = STANDARD
                .decode(envelope.license.trim())
                .map_err(|e| Error::license_decode(format!("invalid license encoding: {}", e)))?;
            Ok(LicenseResponse(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_body_field_names() {
        let mut params = serde_json::Map::new();
        params.insert("adamId".to_string(), serde_json::json!("1234"));

        let body = LicenseRequestBody {
            challenge: vec![1, 2, 3],
            extra_server_parameters: params,
            key_system: "com.widevine.alpha".to_string(),
            uri: "data:;base64,AAAA".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "challenge": "AQID",
                "extra-server-parameters": {"adamId": "1234"},
                "key-system": "com.widevine.alpha",
                "uri": "data:;base64,AAAA"
            })
        );
    }

    #[test]
    fn test_decode_json_envelope() {
        let response =
            decode_response_body(br#"{"license":"AQID"}"#, LicenseResponseFormat::Json).unwrap();
        assert_eq!(response.as_bytes(), &[1, 2, 3]);

        let response =
            decode_response_body(br#"{"License":"BAU="}"#, LicenseResponseFormat::Json).unwrap();
        assert_eq!(response.as_bytes(), &[4, 5]);
    }

    #[test]
    fn test_decode_raw_body() {
        let response = decode_response_body(&[9, 8, 7], LicenseResponseFormat::Raw).unwrap();
        assert_eq!(response.as_bytes(), &[9, 8, 7]);
    }

    #[test]
    fn test_decode_bad_envelope() {
        let err = decode_response_body(b"<html/>", LicenseResponseFormat::Json).unwrap_err();
        assert!(matches!(err, Error::LicenseDecode { .. }));

        let err =
            decode_response_body(br#"{"license":"***"}"#, LicenseResponseFormat::Json).unwrap_err();
        assert!(matches!(err, Error::LicenseDecode { .. }));
    }
}

// src/model.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Names of the discovery document members this crate looks up.
pub mod endpoints {
    pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
    pub const TOKEN_ENDPOINT: &str = "token_endpoint";
    pub const USERINFO_ENDPOINT: &str = "userinfo_endpoint";
    pub const END_SESSION_ENDPOINT: &str = "end_session_endpoint";
    pub const JWKS_URI: &str = "jwks_uri";
    pub const ISSUER: &str = "issuer";
}

/// An OIDC provider's discovery document, as served at
/// `.well-known/openid-configuration`.
///
/// Kept as the flat JSON object the provider returned so that any member can be
/// looked up by name, not only the ones this crate knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryDocument(Map<String, Value>);

impl DiscoveryDocument {
    /// Returns the member `key` as a string.
    ///
    /// Numbers and booleans are rendered as text; `null`, arrays and objects count as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for DiscoveryDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A single JSON Web Key (JWK) as defined in RFC 7517.
///
/// Only the members needed to build RSA verification keys are modelled.
#[derive(Debug, Deserialize)]
pub struct JsonWebKey {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// A JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookups_only_return_scalar_members() {
        let doc: DiscoveryDocument = serde_json::from_value(json!({
            "issuer": "https://idp.example/v2.0/",
            "jwks_uri": "https://idp.example/keys",
            "claims_parameter_supported": false,
            "response_types_supported": ["code", "id_token"],
            "end_session_endpoint": null
        }))
        .unwrap();

        assert_eq!(doc.get(endpoints::ISSUER).as_deref(), Some("https://idp.example/v2.0/"));
        assert_eq!(doc.get("claims_parameter_supported").as_deref(), Some("false"));
        assert!(doc.get("response_types_supported").is_none());
        assert!(!doc.contains(endpoints::END_SESSION_ENDPOINT));
        assert!(!doc.contains(endpoints::USERINFO_ENDPOINT));
    }
}

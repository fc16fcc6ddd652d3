// src/keys.rs

use crate::cache::{cache_key, JWKS_TAG};
use crate::config::ProviderConfig;
use crate::discovery::MetadataResolver;
use crate::error::{NilaOidcError, Result};
use crate::http::{fetch_json_resource, HttpFetcher};
use crate::model::{endpoints, JsonWebKeySet};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use jsonwebtoken::DecodingKey;
use rsa::{BigUint, RsaPublicKey};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// URL-safe base64 that accepts input with or without `=` padding.
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes base64url (`-` and `_` instead of `+` and `/`), padded or not.
///
/// Invalid input is an error, never a best-effort decoding.
pub fn base64url_decode(input: &str) -> Result<Vec<u8>> {
    BASE64_URL_LENIENT
        .decode(input)
        .map_err(|source| NilaOidcError::Base64Decode {
            input: input.to_string(),
            source,
        })
}

/// An RSA public key used to verify ID token signatures.
#[derive(Clone)]
pub struct VerificationKey {
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    /// Builds a key from the big-endian modulus and exponent bytes.
    pub fn from_rsa_components(modulus: Vec<u8>, exponent: Vec<u8>) -> Result<Self> {
        // Rejects empty or oversized moduli and out-of-range exponents before they reach
        // the signature check.
        RsaPublicKey::new(
            BigUint::from_bytes_be(&modulus),
            BigUint::from_bytes_be(&exponent),
        )
        .map_err(|e| NilaOidcError::InvalidKeyFormat(format!("unusable RSA public key: {e}")))?;

        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);
        Ok(Self {
            modulus,
            exponent,
            decoding_key,
        })
    }

    /// Builds a key from the base64url encoded `n` and `e` members of a JWK.
    pub fn from_jwk_components(n: &str, e: &str) -> Result<Self> {
        Self::from_rsa_components(base64url_decode(n)?, base64url_decode(e)?)
    }

    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("modulus_bits", &(self.modulus.len() * 8))
            .field("exponent", &self.exponent)
            .finish()
    }
}

/// Verification keys indexed by key ID (`kid`).
#[derive(Debug, Clone, Default)]
pub struct JwksKeySet {
    keys: HashMap<String, VerificationKey>,
}

impl JwksKeySet {
    /// Builds the key set from a JWKS document.
    ///
    /// Every key must be an RSA key; the first key of any other type aborts the whole
    /// set with [`NilaOidcError::UnsupportedKeyType`].
    pub fn from_jwks(document: Value) -> Result<Self> {
        let jwks: JsonWebKeySet =
            serde_json::from_value(document).map_err(|e| NilaOidcError::json("JWKS document", e))?;

        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in jwks.keys {
            let kid = jwk
                .kid
                .ok_or_else(|| NilaOidcError::InvalidKeyFormat("JWK without 'kid'".to_string()))?;

            if jwk.kty != "RSA" {
                return Err(NilaOidcError::UnsupportedKeyType { kid, kty: jwk.kty });
            }

            let n = jwk.n.as_deref().ok_or_else(|| {
                NilaOidcError::InvalidKeyFormat(format!("RSA key {kid} missing 'n' component"))
            })?;
            let e = jwk.e.as_deref().ok_or_else(|| {
                NilaOidcError::InvalidKeyFormat(format!("RSA key {kid} missing 'e' component"))
            })?;

            keys.insert(kid, VerificationKey::from_jwk_components(n, e)?);
        }

        Ok(Self { keys })
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The cached form: `{ kid: { "n": .., "e": .. } }` with unpadded base64url components.
    fn to_cache_value(&self) -> Value {
        let map: Map<String, Value> = self
            .keys
            .iter()
            .map(|(kid, key)| {
                (
                    kid.clone(),
                    json!({
                        "n": URL_SAFE_NO_PAD.encode(key.modulus()),
                        "e": URL_SAFE_NO_PAD.encode(key.exponent()),
                    }),
                )
            })
            .collect();
        Value::Object(map)
    }

    fn from_cache_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(NilaOidcError::cache("cached key set is not a JSON object"));
        };

        let mut keys = HashMap::with_capacity(map.len());
        for (kid, entry) in map {
            let component = |name: &str| {
                entry
                    .get(name)
                    .and_then(Value::as_str)
                    .ok_or_else(|| NilaOidcError::cache(format!("cached key {kid} has no '{name}'")))
            };
            let key = VerificationKey::from_jwk_components(component("n")?, component("e")?)
                .map_err(|e| NilaOidcError::cache(format!("cached key {kid} is unusable: {e}")))?;
            keys.insert(kid, key);
        }

        Ok(Self { keys })
    }
}

/// Fetches and caches the provider's JSON Web Key Set.
#[derive(Clone)]
pub struct KeyStore {
    config: Arc<ProviderConfig>,
    http: Arc<dyn HttpFetcher>,
    resolver: MetadataResolver,
    cache_key: String,
}

impl KeyStore {
    pub fn new(
        config: Arc<ProviderConfig>,
        http: Arc<dyn HttpFetcher>,
        resolver: MetadataResolver,
    ) -> Self {
        let cache_key = cache_key(config.metadata_url().as_str(), JWKS_TAG);
        Self {
            config,
            http,
            resolver,
            cache_key,
        }
    }

    /// Returns the verification keys, fetching them from `jwks_uri` on a cache miss.
    ///
    /// A key set is only cached once every key in the document has been converted.
    #[instrument(skip(self), err)]
    pub async fn verification_keys(&self) -> Result<JwksKeySet> {
        let cache = self.config.cache();

        if let Some(cached) = cache.get(&self.cache_key).await? {
            debug!("JWKS cache hit");
            return JwksKeySet::from_cache_value(cached);
        }

        let jwks_uri = self.resolver.endpoint(endpoints::JWKS_URI).await?;
        debug!("JWKS cache miss. Fetching from {}", jwks_uri);

        let document = fetch_json_resource(self.http.as_ref(), &jwks_uri).await?;
        let key_set = JwksKeySet::from_jwks(document)?;

        cache
            .set(
                &self.cache_key,
                key_set.to_cache_value(),
                self.config.cache_duration(),
            )
            .await?;
        info!(
            "Successfully fetched {} keys. Caching with TTL: {:?}",
            key_set.len(),
            self.config.cache_duration()
        );

        Ok(key_set)
    }
}

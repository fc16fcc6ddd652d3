// src/validator.rs

use crate::config::ProviderConfig;
use crate::discovery::MetadataResolver;
use crate::error::{Claim, NilaOidcError, Result, ValidationFailure};
use crate::keys::{JwksKeySet, KeyStore};
use jsonwebtoken::{decode, decode_header, get_current_timestamp, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The claims of an ID token that passed every check.
///
/// The payload is kept as-is; standard claims have typed accessors and everything
/// else is available through [`get`](Self::get).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdTokenClaims(Map<String, Value>);

impl IdTokenClaims {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    fn str_claim(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn aud(&self) -> Option<&str> {
        self.str_claim("aud")
    }

    pub fn iss(&self) -> Option<&str> {
        self.str_claim("iss")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.str_claim("nonce")
    }

    pub fn sub(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn exp(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    pub fn iat(&self) -> Option<i64> {
        self.0.get("iat").and_then(Value::as_i64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Validates ID tokens issued by the configured provider.
///
/// Checks run in a fixed order and the first failure wins:
/// 1. the verification keys are obtained,
/// 2. the RS256 signature and the time-based claims are verified,
/// 3. `aud` must be the client ID,
/// 4. `iss` must be the discovered issuer,
/// 5. `nonce` must be the expected nonce.
///
/// Claim contents are never looked at before the signature has been verified.
#[derive(Clone)]
pub struct IdTokenValidator {
    config: Arc<ProviderConfig>,
    resolver: MetadataResolver,
    keys: KeyStore,
}

impl IdTokenValidator {
    pub fn new(config: Arc<ProviderConfig>, resolver: MetadataResolver, keys: KeyStore) -> Self {
        Self {
            config,
            resolver,
            keys,
        }
    }

    /// Validates `id_token` and returns its claims.
    ///
    /// # Errors
    ///
    /// * [`NilaOidcError::Validation`] if the keys cannot be obtained or the signature,
    ///   algorithm, key ID or time-based claims do not verify.
    /// * [`NilaOidcError::Claims`] naming the first of audience, issuer or nonce that
    ///   does not match.
    #[instrument(skip(self, id_token, nonce), err)]
    pub async fn validate(&self, id_token: &str, nonce: &str) -> Result<IdTokenClaims> {
        let keys = self
            .keys
            .verification_keys()
            .await
            .map_err(|e| ValidationFailure::KeySet(Box::new(e)))?;

        let claims = self.verify_signature(id_token, &keys)?;

        expect_claim(&claims, Claim::Audience, self.config.client_id())?;
        let issuer = self.resolver.issuer().await?;
        expect_claim(&claims, Claim::Issuer, &issuer)?;
        expect_claim(&claims, Claim::Nonce, nonce)?;

        debug!("ID token validated for sub {:?}", claims.sub());
        Ok(claims)
    }

    fn verify_signature(&self, id_token: &str, keys: &JwksKeySet) -> Result<IdTokenClaims> {
        let header = decode_header(id_token).map_err(ValidationFailure::Jwt)?;

        if header.alg != Algorithm::RS256 {
            return Err(ValidationFailure::UnsupportedAlgorithm(header.alg).into());
        }

        let kid = header.kid.ok_or(ValidationFailure::MissingKeyId)?;
        let key = keys
            .get(&kid)
            .ok_or_else(|| ValidationFailure::KeyNotFound(kid.clone()))?;

        let leeway = self.config.leeway().as_secs();
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Audience and issuer are compared afterwards so each mismatch gets its own error.
        validation.validate_aud = false;

        let data = decode::<IdTokenClaims>(id_token, key.decoding_key(), &validation)
            .map_err(ValidationFailure::Jwt)?;

        if let Some(iat) = data.claims.iat() {
            let now = i64::try_from(get_current_timestamp()).unwrap_or(i64::MAX);
            if iat > now.saturating_add(leeway as i64) {
                return Err(ValidationFailure::IssuedInFuture(iat).into());
            }
        }

        Ok(data.claims)
    }
}

/// Fails with a claims error unless `claim` is a string equal to `expected`.
fn expect_claim(claims: &IdTokenClaims, claim: Claim, expected: &str) -> Result<()> {
    match claims.get(claim.name()) {
        Some(Value::String(actual)) if actual == expected => Ok(()),
        actual => Err(NilaOidcError::Claims {
            claim,
            expected: expected.to_string(),
            actual: match actual {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "null".to_string(),
            },
        }),
    }
}

// src/error.rs

use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NilaOidcError>;

/// Boxed error carried by transport and cache failures raised by pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The broad category an error belongs to.
///
/// Callers that only care about *what went wrong* (rather than the exact variant)
/// can match on this instead of on [`NilaOidcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transport,
    Decode,
    Cache,
    Validation,
    Claims,
    MissingParameter,
    CodeExchange,
}

/// An ID token claim that is compared against an expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Audience,
    Issuer,
    Nonce,
}

impl Claim {
    /// The JSON member name of the claim.
    pub fn name(&self) -> &'static str {
        match self {
            Claim::Audience => "aud",
            Claim::Issuer => "iss",
            Claim::Nonce => "nonce",
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Claim::Audience => "audience",
            Claim::Issuer => "issuer",
            Claim::Nonce => "nonce",
        })
    }
}

/// Why signature or time-based verification of an ID token failed.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    /// The verification keys could not be obtained.
    #[error("verification keys unavailable: {0}")]
    KeySet(#[source] Box<NilaOidcError>),

    /// Errors originating from the `jsonwebtoken` crate (malformed token, bad signature, expiry).
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token is signed with {0:?}, only RS256 is accepted")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("the JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    #[error("no verification key found for kid: {0}")]
    KeyNotFound(String),

    #[error("cannot handle token issued in the future (iat {0})")]
    IssuedInFuture(i64),
}

/// The primary error type for the `nila-oidc-rp` library.
#[derive(Debug, Error)]
pub enum NilaOidcError {
    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("OpenID Connect metadata URL is invalid: {0}")]
    InvalidUrl(String),

    /// The metadata URL uses a scheme that is not allowed.
    #[error("OpenID Connect metadata URL must use https: {0}")]
    IllegalScheme(String),

    #[error("Cache duration has to be a non-negative number of seconds, got {0}")]
    NegativeCacheDuration(i64),

    #[error("Leeway has to be a non-negative number of seconds, got {0}")]
    NegativeLeeway(i64),

    /// The discovery document does not define the requested key.
    #[error("Required config key not defined: {0}")]
    MissingConfigurationKey(String),

    /// A remote JSON resource answered with something other than HTTP 200.
    #[error("Cannot access json resource: {url} (HTTP {status})")]
    HttpStatus { url: String, status: u16 },

    /// The HTTP request itself failed (DNS, connect, TLS, ...).
    #[error("HTTP request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// A document was not valid JSON or did not have the expected shape.
    #[error("Invalid JSON in {resource}: {reason}")]
    Json { resource: String, reason: String },

    /// A base64url encoded value could not be decoded.
    #[error("Error url decoding input {input}: {source}")]
    Base64Decode {
        input: String,
        #[source]
        source: base64::DecodeError,
    },

    /// The JWKS contains a key type other than RSA.
    #[error("Unsupported key data for key id: {kid} (kty {kty})")]
    UnsupportedKeyType { kid: String, kty: String },

    /// A JWK is malformed or its RSA components are unusable.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The cache backend failed, or returned data that cannot be used.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Signature, algorithm or time-based claim verification failed.
    #[error("ID token validation failed: {0}")]
    Validation(#[source] ValidationFailure),

    /// A verified token carries an unexpected audience, issuer or nonce.
    #[error("ID token has incorrect {claim}: {actual}")]
    Claims {
        claim: Claim,
        expected: String,
        actual: String,
    },

    /// The caller omitted a request parameter that must be present.
    #[error("Required parameter \"{0}\" missing")]
    MissingParameter(&'static str),

    /// Exchanging an authorization code for an ID token failed.
    #[error("Get ID token failed: {0}")]
    CodeExchange(String),
}

impl NilaOidcError {
    /// Maps the error onto its category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NilaOidcError::MissingConfiguration(_)
            | NilaOidcError::InvalidUrl(_)
            | NilaOidcError::IllegalScheme(_)
            | NilaOidcError::NegativeCacheDuration(_)
            | NilaOidcError::NegativeLeeway(_)
            | NilaOidcError::MissingConfigurationKey(_) => ErrorKind::Configuration,
            NilaOidcError::HttpStatus { .. } | NilaOidcError::Transport { .. } => {
                ErrorKind::Transport
            }
            NilaOidcError::Json { .. }
            | NilaOidcError::Base64Decode { .. }
            | NilaOidcError::UnsupportedKeyType { .. }
            | NilaOidcError::InvalidKeyFormat(_) => ErrorKind::Decode,
            NilaOidcError::Cache { .. } => ErrorKind::Cache,
            NilaOidcError::Validation(_) => ErrorKind::Validation,
            NilaOidcError::Claims { .. } => ErrorKind::Claims,
            NilaOidcError::MissingParameter(_) => ErrorKind::MissingParameter,
            NilaOidcError::CodeExchange(_) => ErrorKind::CodeExchange,
        }
    }

    pub(crate) fn cache(message: impl Into<String>) -> Self {
        NilaOidcError::Cache {
            message: message.into(),
            source: None,
        }
    }

    #[cfg(feature = "redis-cache")]
    pub(crate) fn cache_backend(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        NilaOidcError::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn json(resource: impl Into<String>, reason: impl fmt::Display) -> Self {
        NilaOidcError::Json {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ValidationFailure> for NilaOidcError {
    fn from(failure: ValidationFailure) -> Self {
        NilaOidcError::Validation(failure)
    }
}

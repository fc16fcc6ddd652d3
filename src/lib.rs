// src/lib.rs

//! OpenID Connect relying-party helper.
//!
//! Discovers a provider's endpoints from its metadata document, fetches and caches its
//! JSON Web Key Set, validates RS256 ID tokens and builds the authorization, logout and
//! token URLs of the OAuth2/OIDC flows. Discovery documents and key sets are cached
//! through a pluggable [`CacheStore`](cache::CacheStore).

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod keys;
pub mod model;
pub mod provider;
pub mod urls;
pub mod validator;

/// The public prelude for the `nila-oidc-rp` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    #[cfg(feature = "redis-cache")]
    pub use crate::cache::RedisCacheStore;
    pub use crate::cache::{CacheStore, MemoryCacheStore};
    pub use crate::config::{ConfigBuilder, ProviderConfig, ProviderSettings};
    pub use crate::discovery::MetadataResolver;
    pub use crate::error::{Claim, ErrorKind, NilaOidcError};
    pub use crate::http::{HttpFetcher, HttpResponse, ReqwestFetcher};
    pub use crate::keys::{JwksKeySet, KeyStore, VerificationKey};
    pub use crate::model::{endpoints, DiscoveryDocument};
    pub use crate::provider::RelyingParty;
    pub use crate::urls::{
        generate_nonce, generate_state, AuthorizationParams, UrlBuilder, DEFAULT_RANDOM_LENGTH,
    };
    pub use crate::validator::{IdTokenClaims, IdTokenValidator};
    pub use jsonwebtoken::Algorithm;
}

// src/provider.rs

use crate::config::ProviderConfig;
use crate::discovery::MetadataResolver;
use crate::error::{NilaOidcError, Result};
use crate::http::{HttpFetcher, ReqwestFetcher};
use crate::keys::{JwksKeySet, KeyStore};
use crate::model::DiscoveryDocument;
use crate::urls::{AuthorizationParams, UrlBuilder};
use crate::validator::{IdTokenClaims, IdTokenValidator};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// An OpenID Connect relying party for a single provider.
///
/// Bundles the metadata resolver, key store, ID token validator and URL builder
/// around one [`ProviderConfig`]. Cheap to clone; clones share the configuration,
/// HTTP client and cache store.
#[derive(Clone)]
pub struct RelyingParty {
    config: Arc<ProviderConfig>,
    http: Arc<dyn HttpFetcher>,
    resolver: MetadataResolver,
    keys: KeyStore,
    validator: IdTokenValidator,
    urls: UrlBuilder,
}

impl RelyingParty {
    /// Creates a relying party that talks to the provider with a default `reqwest` client.
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_http_fetcher(config, Arc::new(ReqwestFetcher::new()))
    }

    /// Creates a relying party that uses `http` for every request to the provider.
    pub fn with_http_fetcher(config: ProviderConfig, http: Arc<dyn HttpFetcher>) -> Self {
        let config = Arc::new(config);
        let resolver = MetadataResolver::new(config.clone(), http.clone());
        let keys = KeyStore::new(config.clone(), http.clone(), resolver.clone());
        let validator = IdTokenValidator::new(config.clone(), resolver.clone(), keys.clone());
        let urls = UrlBuilder::new(config.clone(), resolver.clone());

        Self {
            config,
            http,
            resolver,
            keys,
            validator,
            urls,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    pub fn validator(&self) -> &IdTokenValidator {
        &self.validator
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    pub async fn discovery_document(&self) -> Result<DiscoveryDocument> {
        self.resolver.document().await
    }

    /// Looks up a member of the discovery document by name.
    pub async fn endpoint(&self, name: &str) -> Result<String> {
        self.resolver.endpoint(name).await
    }

    pub async fn issuer(&self) -> Result<String> {
        self.resolver.issuer().await
    }

    pub async fn verification_keys(&self) -> Result<JwksKeySet> {
        self.keys.verification_keys().await
    }

    /// See [`IdTokenValidator::validate`].
    pub async fn validate_id_token(&self, id_token: &str, nonce: &str) -> Result<IdTokenClaims> {
        self.validator.validate(id_token, nonce).await
    }

    pub async fn base_authorization_url(&self) -> Result<String> {
        self.urls.base_authorization_url().await
    }

    /// See [`UrlBuilder::authorization_url`].
    pub async fn authorization_url(&self, params: &AuthorizationParams) -> Result<String> {
        self.urls.authorization_url(params).await
    }

    /// See [`UrlBuilder::end_session_url`].
    pub async fn end_session_url(
        &self,
        post_logout_redirect_uri: Option<&str>,
        state: Option<&str>,
        id_token_hint: Option<&str>,
    ) -> Result<String> {
        self.urls
            .end_session_url(post_logout_redirect_uri, state, id_token_hint)
            .await
    }

    pub async fn access_token_endpoint(&self) -> Result<String> {
        self.urls.access_token_endpoint().await
    }

    pub async fn resource_owner_details_endpoint(&self) -> Result<String> {
        self.urls.resource_owner_details_endpoint().await
    }

    /// Exchanges an authorization `code` for the raw ID token at the token endpoint.
    ///
    /// The returned token has not been validated; pass it to
    /// [`validate_id_token`](Self::validate_id_token). The request is made exactly once.
    ///
    /// # Errors
    ///
    /// [`NilaOidcError::CodeExchange`] wrapping whatever went wrong: endpoint lookup,
    /// transport, an error status or `error` member in the response, invalid JSON, or a
    /// response without `id_token`.
    #[instrument(skip(self, code), err)]
    pub async fn id_token_from_code(&self, code: &str) -> Result<String> {
        self.exchange_code(code)
            .await
            .map_err(|e| match e {
                NilaOidcError::CodeExchange(_) => e,
                other => NilaOidcError::CodeExchange(other.to_string()),
            })
    }

    async fn exchange_code(&self, code: &str) -> Result<String> {
        let endpoint = self.urls.access_token_endpoint().await?;
        debug!("Exchanging authorization code at {}", endpoint);

        let params = [
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret()),
            ("redirect_uri", self.config.redirect_uri()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ];
        let response = self.http.post_form(&endpoint, &params).await?;

        let payload = serde_json::from_slice::<Value>(&response.body);

        if response.status >= 400 {
            let detail = payload
                .ok()
                .as_ref()
                .and_then(error_member)
                .map(|error| format!(": {error}"))
                .unwrap_or_default();
            return Err(NilaOidcError::CodeExchange(format!(
                "HTTP {}{detail}",
                response.status
            )));
        }

        let payload = payload.map_err(|e| NilaOidcError::json(endpoint.as_str(), e))?;
        if let Some(error) = error_member(&payload) {
            return Err(NilaOidcError::CodeExchange(error));
        }

        payload
            .get("id_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NilaOidcError::CodeExchange("response has no id_token".to_string()))
    }
}

/// The `error` member of an OAuth2 error response, if present.
fn error_member(payload: &Value) -> Option<String> {
    match payload.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// src/config.rs

use crate::cache::CacheStore;
use crate::error::{NilaOidcError, Result};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How long discovery documents and key sets are cached unless configured otherwise.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(86_400);

/// Default clock skew tolerance for `exp`, `nbf` and `iat`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(10);

/// The configuration of a single relying party.
///
/// Immutable once built; construct it with [`ConfigBuilder`].
#[derive(Clone)]
pub struct ProviderConfig {
    metadata_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    cache_duration: Duration,
    leeway: Duration,
    allow_insecure_scheme: bool,
    cache: Arc<dyn CacheStore>,
}

impl ProviderConfig {
    /// The provider's `.well-known/openid-configuration` URL.
    pub fn metadata_url(&self) -> &Url {
        &self.metadata_url
    }

    /// The client ID registered with the provider; ID tokens must carry it as `aud`.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn cache_duration(&self) -> Duration {
        self.cache_duration
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn allow_insecure_scheme(&self) -> bool {
        self.allow_insecure_scheme
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("metadata_url", &self.metadata_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("cache_duration", &self.cache_duration)
            .field("leeway", &self.leeway)
            .field("allow_insecure_scheme", &self.allow_insecure_scheme)
            .finish_non_exhaustive()
    }
}

/// A builder for creating a [`ProviderConfig`].
///
/// ```rust,no_run
/// use nila_oidc_rp::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), NilaOidcError> {
/// let config = ConfigBuilder::new()
///     .metadata_url("https://tenant.b2clogin.com/tenant.onmicrosoft.com/v2.0/.well-known/openid-configuration?p=B2C_1_signin")
///     .client_id("my-client")
///     .client_secret("my-secret")
///     .redirect_uri("https://app.example.com/callback")
///     .cache(Arc::new(MemoryCacheStore::default()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    metadata_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    cache_duration: Option<Duration>,
    leeway: Option<Duration>,
    allow_insecure_scheme: bool,
    cache: Option<Arc<dyn CacheStore>>,
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("metadata_url", &self.metadata_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("cache_duration", &self.cache_duration)
            .field("leeway", &self.leeway)
            .field("allow_insecure_scheme", &self.allow_insecure_scheme)
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the metadata (discovery) URL. This is a required field.
    ///
    /// The URL is checked by [`build`](Self::build), once the insecure scheme flag is known.
    pub fn metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = Some(url.into());
        self
    }

    /// Sets the client ID of the application. This is a required field.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret used for the authorization code exchange. This is a required field.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the redirect URI registered with the provider. This is a required field.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Sets the cache store. This is a required field.
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets how long the discovery document and key set are cached.
    /// Defaults to 24 hours.
    pub fn cache_duration(mut self, ttl: Duration) -> Self {
        self.cache_duration = Some(ttl);
        self
    }

    /// Sets the cache duration from a signed number of seconds, rejecting negative values.
    pub fn cache_duration_secs(self, seconds: i64) -> Result<Self> {
        let seconds = u64::try_from(seconds).map_err(|_| NilaOidcError::NegativeCacheDuration(seconds))?;
        Ok(self.cache_duration(Duration::from_secs(seconds)))
    }

    /// Sets the clock skew tolerance.
    /// Defaults to 10 seconds.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Sets the leeway from a signed number of seconds, rejecting negative values.
    pub fn leeway_secs(self, seconds: i64) -> Result<Self> {
        let seconds = u64::try_from(seconds).map_err(|_| NilaOidcError::NegativeLeeway(seconds))?;
        Ok(self.leeway(Duration::from_secs(seconds)))
    }

    /// Allows a plain `http` metadata URL. Meant for local development and tests.
    pub fn allow_insecure_scheme(mut self, allow: bool) -> Self {
        self.allow_insecure_scheme = allow;
        self
    }

    /// Consumes the builder and returns a `ProviderConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, or if the metadata URL is
    /// not a valid absolute URL with an allowed scheme.
    pub fn build(self) -> Result<ProviderConfig> {
        let raw_url = self
            .metadata_url
            .ok_or_else(|| NilaOidcError::MissingConfiguration("metadata_url".to_string()))?;
        let cache = self
            .cache
            .ok_or_else(|| NilaOidcError::MissingConfiguration("cache".to_string()))?;
        let metadata_url = parse_metadata_url(&raw_url, self.allow_insecure_scheme)?;

        let client_id = self
            .client_id
            .ok_or_else(|| NilaOidcError::MissingConfiguration("client_id".to_string()))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| NilaOidcError::MissingConfiguration("client_secret".to_string()))?;
        let redirect_uri = self
            .redirect_uri
            .ok_or_else(|| NilaOidcError::MissingConfiguration("redirect_uri".to_string()))?;

        Ok(ProviderConfig {
            metadata_url,
            client_id,
            client_secret,
            redirect_uri,
            cache_duration: self.cache_duration.unwrap_or(DEFAULT_CACHE_DURATION),
            leeway: self.leeway.unwrap_or(DEFAULT_LEEWAY),
            allow_insecure_scheme: self.allow_insecure_scheme,
            cache,
        })
    }
}

fn parse_metadata_url(raw: &str, allow_insecure_scheme: bool) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| NilaOidcError::InvalidUrl(format!("{raw} ({e})")))?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_insecure_scheme => Ok(url),
        _ => Err(NilaOidcError::IllegalScheme(raw.to_string())),
    }
}

/// Relying party settings as they appear in a configuration file.
///
/// Everything except the cache store, which is always supplied by the application.
///
/// ```json
/// {
///   "metadataUrl": "https://tenant.b2clogin.com/.../.well-known/openid-configuration?p=B2C_1_signin",
///   "clientId": "my-client",
///   "clientSecret": "my-secret",
///   "redirectUri": "https://app.example.com/callback",
///   "cacheDurationSeconds": 3600,
///   "leewaySeconds": 30
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub metadata_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub cache_duration_seconds: Option<i64>,
    #[serde(default)]
    pub leeway_seconds: Option<i64>,
    #[serde(default)]
    pub allow_insecure_scheme: bool,
}

impl ProviderSettings {
    /// Turns the settings into a builder; only the cache remains to be set.
    pub fn into_builder(self) -> Result<ConfigBuilder> {
        let mut builder = ConfigBuilder::new()
            .metadata_url(self.metadata_url)
            .client_id(self.client_id)
            .client_secret(self.client_secret)
            .redirect_uri(self.redirect_uri)
            .allow_insecure_scheme(self.allow_insecure_scheme);

        if let Some(seconds) = self.cache_duration_seconds {
            builder = builder.cache_duration_secs(seconds)?;
        }
        if let Some(seconds) = self.leeway_seconds {
            builder = builder.leeway_secs(seconds)?;
        }
        Ok(builder)
    }
}

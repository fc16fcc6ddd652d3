// src/discovery.rs

use crate::cache::{cache_key, CONFIGURATION_TAG};
use crate::config::ProviderConfig;
use crate::error::{NilaOidcError, Result};
use crate::http::{fetch_json_resource, HttpFetcher};
use crate::model::{endpoints, DiscoveryDocument};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Resolves endpoint URLs from the provider's discovery document.
///
/// The document is fetched on the first lookup and then served from the configured
/// [`CacheStore`](crate::cache::CacheStore) until it expires there. There is no
/// background refresh: an expired entry is refetched by the next lookup.
#[derive(Clone)]
pub struct MetadataResolver {
    config: Arc<ProviderConfig>,
    http: Arc<dyn HttpFetcher>,
    cache_key: String,
}

impl MetadataResolver {
    pub fn new(config: Arc<ProviderConfig>, http: Arc<dyn HttpFetcher>) -> Self {
        let cache_key = cache_key(config.metadata_url().as_str(), CONFIGURATION_TAG);
        Self {
            config,
            http,
            cache_key,
        }
    }

    /// Returns the discovery document, from cache if possible.
    #[instrument(skip(self), fields(metadata_url = %self.config.metadata_url()), err)]
    pub async fn document(&self) -> Result<DiscoveryDocument> {
        let cache = self.config.cache();

        if let Some(cached) = cache.get(&self.cache_key).await? {
            debug!("Discovery document cache hit");
            return match cached {
                Value::Object(map) => Ok(DiscoveryDocument::from(map)),
                _ => Err(NilaOidcError::cache(format!(
                    "cached configuration under {} is not a JSON object",
                    self.cache_key
                ))),
            };
        }

        debug!("Discovery document cache miss. Fetching from provider.");
        let url = self.config.metadata_url().as_str();
        let map = match fetch_json_resource(self.http.as_ref(), url).await? {
            Value::Object(map) => map,
            _ => return Err(NilaOidcError::json(url, "expected a JSON object")),
        };

        cache
            .set(
                &self.cache_key,
                Value::Object(map.clone()),
                self.config.cache_duration(),
            )
            .await?;
        info!(
            "Cached discovery document with {} members for {:?}",
            map.len(),
            self.config.cache_duration()
        );

        Ok(DiscoveryDocument::from(map))
    }

    /// Looks up a single member of the discovery document, e.g. `"token_endpoint"`.
    ///
    /// # Errors
    ///
    /// [`NilaOidcError::MissingConfigurationKey`] if the document does not define `name`,
    /// or any error raised while fetching or caching the document.
    pub async fn endpoint(&self, name: &str) -> Result<String> {
        self.document()
            .await?
            .get(name)
            .ok_or_else(|| NilaOidcError::MissingConfigurationKey(name.to_string()))
    }

    /// The issuer identifier ID tokens must carry as `iss`.
    pub async fn issuer(&self) -> Result<String> {
        self.endpoint(endpoints::ISSUER).await
    }
}

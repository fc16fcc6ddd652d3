// src/urls.rs

use crate::config::ProviderConfig;
use crate::discovery::MetadataResolver;
use crate::error::{NilaOidcError, Result};
use crate::model::endpoints;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

/// Length of generated `state` and `nonce` values unless another is requested.
pub const DEFAULT_RANDOM_LENGTH: usize = 32;

/// Returns a random alphanumeric string of exactly `length` characters.
///
/// Drawn from the thread-local CSPRNG, so values are suitable as CSRF `state`
/// and replay-protection `nonce` values.
pub fn random_token(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generates a value for the `state` parameter of an authorization request.
pub fn generate_state(length: usize) -> String {
    random_token(length)
}

/// Generates a value for the `nonce` parameter of an authorization request.
pub fn generate_nonce(length: usize) -> String {
    random_token(length)
}

/// Parameters of an authorization request.
///
/// `state` and `nonce` are mandatory. `scope`, `response_type` and `response_mode`
/// default to `openid`, `id_token` and `query`.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationParams {
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub scope: Option<String>,
    pub response_type: Option<String>,
    pub response_mode: Option<String>,
    /// Overrides the configured redirect URI for this request.
    pub redirect_uri: Option<String>,
    /// Additional parameters such as `prompt` or `login_hint`, appended last.
    pub extra: Vec<(String, String)>,
}

impl AuthorizationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = Some(response_type.into());
        self
    }

    pub fn response_mode(mut self, response_mode: impl Into<String>) -> Self {
        self.response_mode = Some(response_mode.into());
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Appends `params` to `base`, joining with `&` when `base` already carries a query
/// string and `?` otherwise. `base` is returned untouched when `params` is empty.
fn append_query<'a, I>(base: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (name, value) in params {
        serializer.append_pair(name, value);
        any = true;
    }
    if !any {
        return base.to_string();
    }

    let glue = if base.contains('?') { '&' } else { '?' };
    format!("{base}{glue}{}", serializer.finish())
}

/// Builds the redirect and endpoint URLs of the OAuth2/OIDC flows.
#[derive(Clone)]
pub struct UrlBuilder {
    config: Arc<ProviderConfig>,
    resolver: MetadataResolver,
}

impl UrlBuilder {
    pub fn new(config: Arc<ProviderConfig>, resolver: MetadataResolver) -> Self {
        Self { config, resolver }
    }

    /// The discovered `authorization_endpoint`, without any parameters.
    pub async fn base_authorization_url(&self) -> Result<String> {
        self.resolver
            .endpoint(endpoints::AUTHORIZATION_ENDPOINT)
            .await
    }

    /// Builds the URL the user agent is sent to in order to authenticate.
    ///
    /// # Errors
    ///
    /// [`NilaOidcError::MissingParameter`] if `state` or `nonce` is missing or empty.
    pub async fn authorization_url(&self, params: &AuthorizationParams) -> Result<String> {
        let state = non_empty(&params.state).ok_or(NilaOidcError::MissingParameter("state"))?;
        let nonce = non_empty(&params.nonce).ok_or(NilaOidcError::MissingParameter("nonce"))?;

        let base = self.base_authorization_url().await?;

        let mut query: Vec<(&str, &str)> = vec![
            ("scope", non_empty(&params.scope).unwrap_or("openid")),
            (
                "response_type",
                non_empty(&params.response_type).unwrap_or("id_token"),
            ),
            (
                "response_mode",
                non_empty(&params.response_mode).unwrap_or("query"),
            ),
            ("state", state),
            ("nonce", nonce),
            ("client_id", self.config.client_id()),
            (
                "redirect_uri",
                non_empty(&params.redirect_uri).unwrap_or(self.config.redirect_uri()),
            ),
        ];
        query.extend(
            params
                .extra
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );

        let url = append_query(&base, query);
        debug!("Built authorization URL: {}", url);
        Ok(url)
    }

    /// Builds the RP-initiated logout URL from the discovered `end_session_endpoint`.
    ///
    /// Each parameter is only added when it is present and non-empty.
    pub async fn end_session_url(
        &self,
        post_logout_redirect_uri: Option<&str>,
        state: Option<&str>,
        id_token_hint: Option<&str>,
    ) -> Result<String> {
        let base = self
            .resolver
            .endpoint(endpoints::END_SESSION_ENDPOINT)
            .await?;

        let params = [
            ("post_logout_redirect_uri", post_logout_redirect_uri),
            ("state", state),
            ("id_token_hint", id_token_hint),
        ];
        Ok(append_query(
            &base,
            params
                .into_iter()
                .filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v))),
        ))
    }

    /// The discovered `token_endpoint`.
    pub async fn access_token_endpoint(&self) -> Result<String> {
        self.resolver.endpoint(endpoints::TOKEN_ENDPOINT).await
    }

    /// The discovered `userinfo_endpoint`.
    pub async fn resource_owner_details_endpoint(&self) -> Result<String> {
        self.resolver.endpoint(endpoints::USERINFO_ENDPOINT).await
    }
}

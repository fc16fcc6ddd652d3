// src/http.rs

use crate::error::{NilaOidcError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

/// Status and body of an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The HTTP transport used to reach the identity provider.
///
/// Any status code is a successful response at this level; only failures to get a
/// response at all (DNS, connect, TLS, timeouts configured on the client) are errors.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// POSTs `params` as an `application/x-www-form-urlencoded` body.
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// [`HttpFetcher`] backed by a `reqwest::Client`.
///
/// Timeouts, proxies and TLS settings belong on the client passed to
/// [`ReqwestFetcher::with_client`].
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn into_response(url: &str, response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| transport(url, e))?;
        Ok(HttpResponse { status, body })
    }
}

fn transport(url: &str, source: reqwest::Error) -> NilaOidcError {
    NilaOidcError::Transport {
        url: url.to_string(),
        source: Box::new(source),
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        Self::into_response(url, response).await
    }

    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        Self::into_response(url, response).await
    }
}

/// GETs `url`, requires HTTP 200 and decodes the body as JSON.
pub(crate) async fn fetch_json_resource(http: &dyn HttpFetcher, url: &str) -> Result<Value> {
    debug!("Fetching json resource: {}", url);
    let response = http.get(url).await?;

    if response.status != 200 {
        return Err(NilaOidcError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    serde_json::from_slice(&response.body).map_err(|e| NilaOidcError::json(url, e))
}

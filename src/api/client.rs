// SPDX-License-Identifier: MPL-2.0

use crate::config::DEFAULT_API_BASE;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("api error {status}: {code} ({message})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Query or form parameters, in the order they should be sent
pub type Params = Vec<(String, String)>;

/// Request/response access to the REST API. Paths are relative to the API root.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, RemoteError>;

    async fn post(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError>;
}

/// reqwest-backed client for the public REST API.
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    access_token: Option<String>,
}

impl RestClient {
    pub fn new(api_base: &str, access_token: Option<String>) -> Result<Self, RemoteError> {
        // Url::join drops the last segment unless the base ends with a slash
        let base = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{}/", api_base)
        };
        let base = Url::parse(&base).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base,
            access_token,
        })
    }

    pub fn with_defaults(access_token: Option<String>) -> Result<Self, RemoteError> {
        Self::new(DEFAULT_API_BASE, access_token)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, RemoteError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| RemoteError::Network(e.to_string()))?;
            return Err(api_error(status.as_u16(), &body));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                RemoteError::InvalidResponse(e.to_string())
            } else {
                RemoteError::Network(e.to_string())
            }
        })
    }
}

#[async_trait]
impl RemoteClient for RestClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, RemoteError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        self.send(self.http.get(url).query(query)).await
    }

    async fn post(&self, path: &str, params: &[(String, String)]) -> Result<Value, RemoteError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        self.send(self.http.post(url).form(params)).await
    }
}

/// Error bodies look like `{"error": "unauthorized", "message": "..."}`
fn api_error(status: u16, body: &str) -> RemoteError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .map(String::from)
    };

    RemoteError::Api {
        status,
        code: field("error").unwrap_or_else(|| "http_error".to_string()),
        message: field("message").unwrap_or_default(),
    }
}

//! HTTP transport for one endpoint.
//!
//! One `reqwest::Client` per endpoint so connections are reused across the
//! whole sync. Only idempotent GETs retry, and only on connection-class
//! errors, with exponential backoff bounded by attempt count; every other
//! verb surfaces its first failure.

use crate::client::endpoint::Endpoint;
use crate::client::types::ClientError;
use crate::constants;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    get_attempts: u32,
}

impl Transport {
    /// Build the transport for an endpoint
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(endpoint: &Endpoint) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: endpoint.base_url().to_string(),
            user: endpoint.user.clone(),
            password: endpoint.password.clone(),
            get_attempts: constants::DEFAULT_GET_ATTEMPTS,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        self.http
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }

    fn connection_error(&self, source: reqwest::Error) -> ClientError {
        ClientError::Connection {
            url: self.base_url.clone(),
            source,
        }
    }

    /// Run an idempotent call with bounded retries on connection errors
    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T, ClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut backoff_ms = constants::DEFAULT_BACKOFF_START_MS;
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connection() && attempt < self.get_attempts => {
                    warn!(
                        "GET attempt {}/{} failed ({}), retrying in {}ms",
                        attempt, self.get_attempts, err, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(constants::DEFAULT_BACKOFF_MAX_MS);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn error_from_response(path: &str, response: Response) -> ClientError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ClientError::Http {
            status,
            path: path.to_string(),
            body,
        }
    }

    /// GET a JSON document (retried)
    ///
    /// # Errors
    /// `Connection` after exhausted retries, `Http` for error statuses,
    /// `Decode` when the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let this = self;
        self.with_retry(move || async move {
            debug!("GET {}", path);
            let response = this
                .request(Method::GET, path)
                .send()
                .await
                .map_err(|e| this.connection_error(e))?;
            if !response.status().is_success() {
                return Err(Self::error_from_response(path, response).await);
            }
            response.json::<T>().await.map_err(|e| ClientError::Decode {
                path: path.to_string(),
                source: e.into(),
            })
        })
        .await
    }

    /// GET a plain-text body (retried)
    ///
    /// # Errors
    /// `Connection` after exhausted retries, `Http` for error statuses.
    pub async fn get_text(&self, path: &str) -> Result<String, ClientError> {
        let this = self;
        self.with_retry(move || async move {
            debug!("GET {}", path);
            let response = this
                .request(Method::GET, path)
                .send()
                .await
                .map_err(|e| this.connection_error(e))?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound {
                    name: path.to_string(),
                });
            }
            if !response.status().is_success() {
                return Err(Self::error_from_response(path, response).await);
            }
            response.text().await.map_err(|e| ClientError::Decode {
                path: path.to_string(),
                source: e.into(),
            })
        })
        .await
    }

    /// Send a JSON body; the raw response is returned for status-specific
    /// decoding by the caller (not retried)
    ///
    /// # Errors
    /// `Connection` on transport failure.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Response, ClientError> {
        debug!("{} {}", method, path);
        self.request(method, path)
            .json(body)
            .send()
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Send a raw text/bytes body (not retried)
    ///
    /// # Errors
    /// `Connection` on transport failure.
    pub async fn send_bytes(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
    ) -> Result<Response, ClientError> {
        debug!("{} {}", method, path);
        self.request(method, path)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Send a bodyless request (not retried)
    ///
    /// # Errors
    /// `Connection` on transport failure.
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<Response, ClientError> {
        debug!("{} {}", method, path);
        self.request(method, path)
            .send()
            .await
            .map_err(|e| self.connection_error(e))
    }

    /// Map a non-success response to the standard error kinds
    ///
    /// # Errors
    /// `NotFound`/`AlreadyExists`/`Http` depending on status and body.
    pub async fn ensure_success(
        path: &str,
        name: &str,
        response: Response,
    ) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                name: name.to_string(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT && body.to_ascii_lowercase().contains("already exists") {
            return Err(ClientError::AlreadyExists {
                name: name.to_string(),
            });
        }
        Err(ClientError::Http {
            status: status.as_u16(),
            path: path.to_string(),
            body,
        })
    }
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Source sidecar API.
//!
//! The sidecar owns the Source session. Every call is a JSON request
//! authenticated with a bearer token; media downloads come back as a raw
//! byte stream.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use threadlink_core::{BridgeError, MediaStream};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay before the single retry of a transient failure.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Error body returned by the sidecar on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

fn transport_error(path: &str, e: reqwest::Error) -> BridgeError {
    BridgeError::Source {
        message: format!("sidecar request to {path} failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Client for one sidecar instance.
#[derive(Clone)]
pub struct SidecarClient {
    client: reqwest::Client,
    base_url: String,
}

impl SidecarClient {
    pub fn new(base_url: &str, api_token: Option<&str>) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| BridgeError::Config(format!("invalid whatsapp.api_token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Source {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// POSTs a JSON body and decodes the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BridgeError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self.send_with_retry(path, Some(body)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(path, e))
    }

    /// POSTs a JSON body and ignores the response body.
    pub async fn post_unit<B>(&self, path: &str, body: &B) -> Result<(), BridgeError>
    where
        B: Serialize + Sync,
    {
        self.send_with_retry(path, Some(body)).await?;
        Ok(())
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, BridgeError>
    where
        T: DeserializeOwned,
    {
        let response = self.send_with_retry::<()>(path, None).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(path, e))
    }

    /// POSTs a JSON body and streams the raw response body back in chunks.
    pub async fn post_stream<B>(&self, path: &str, body: &B) -> Result<MediaStream, BridgeError>
    where
        B: Serialize + Sync,
    {
        let response = self.send_with_retry(path, Some(body)).await?;
        let owned_path = path.to_string();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| transport_error(&owned_path, e))
        });
        Ok(Box::pin(stream))
    }

    async fn send_with_retry<B>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, BridgeError>
    where
        B: Serialize + Sync,
    {
        let mut retried = false;
        loop {
            let request = match body {
                Some(body) => self.client.post(self.url(path)).json(body),
                None => self.client.get(self.url(path)),
            };
            let response = request
                .send()
                .await
                .map_err(|e| transport_error(path, e))?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if is_transient(status) && !retried {
                warn!(path, %status, "sidecar returned transient error, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                retried = true;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            debug!(path, %status, %message, "sidecar call failed");
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(BridgeError::Unauthorized(format!(
                    "sidecar rejected credentials on {path}"
                )));
            }
            return Err(BridgeError::source_failure(format!(
                "{path} returned {status}: {message}"
            )));
        }
    }
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thin HTTP client for the Telegram Bot API.
//!
//! Provides [`BotApi`] which builds method URLs, decodes the `ok`/`result`
//! envelope, retries once on flood control, and turns missing-topic
//! descriptions into [`BridgeError::ThreadNotFound`].

use std::time::Duration;

use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use threadlink_core::BridgeError;

/// Descriptions the Bot API uses when a forum topic is gone.
const THREAD_NOT_FOUND_MARKERS: [&str; 3] =
    ["message thread not found", "TOPIC_DELETED", "TOPIC_ID_INVALID"];

/// Longest flood-control pause honored before retrying.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The Bot API response envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// Returns `true` if a Bot API error description means the topic is gone.
pub fn is_thread_not_found(description: &str) -> bool {
    THREAD_NOT_FOUND_MARKERS
        .iter()
        .any(|marker| description.contains(marker))
}

/// Maps a failed call to the bridge error taxonomy.
pub fn api_error(method: &str, description: &str) -> BridgeError {
    if is_thread_not_found(description) {
        BridgeError::ThreadNotFound {
            message: description.to_string(),
        }
    } else {
        BridgeError::sink(format!("{method} failed: {description}"))
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> BridgeError {
    BridgeError::Sink {
        message: format!("{method} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Request body of a Bot API call.
enum Payload<'a, P: Serialize> {
    Json(&'a P),
    Multipart(&'a (dyn Fn() -> Form + Sync)),
}

/// HTTP client for one bot token.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    method_base: String,
    file_base: String,
}

impl BotApi {
    pub fn new(api_url: &str, token: &str) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Sink {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        let api_url = api_url.trim_end_matches('/');
        Ok(Self {
            client,
            method_base: format!("{api_url}/bot{token}"),
            file_base: format!("{api_url}/file/bot{token}"),
        })
    }

    /// Calls `method` with a JSON body.
    pub async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, BridgeError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.execute(method, Payload::Json(params), None).await
    }

    /// Calls `method` with a JSON body and a per-request timeout.
    pub async fn call_with_timeout<P, T>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<T, BridgeError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.execute(method, Payload::Json(params), Some(timeout))
            .await
    }

    /// Calls `method` with a multipart body. `form` is invoked once per attempt.
    pub async fn call_multipart<T>(
        &self,
        method: &str,
        form: &(dyn Fn() -> Form + Sync),
    ) -> Result<T, BridgeError>
    where
        T: DeserializeOwned,
    {
        self.execute::<(), T>(method, Payload::Multipart(form), None)
            .await
    }

    async fn execute<P, T>(
        &self,
        method: &str,
        payload: Payload<'_, P>,
        timeout: Option<Duration>,
    ) -> Result<T, BridgeError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.method_base);
        let mut retried = false;
        loop {
            let mut request = self.client.post(&url);
            request = match &payload {
                Payload::Json(params) => request.json(params),
                Payload::Multipart(form) => request.multipart(form()),
            };
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error(method, e))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| transport_error(method, e))?;
            let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
                BridgeError::Sink {
                    message: format!("{method} returned {status} with undecodable body"),
                    source: Some(Box::new(e)),
                }
            })?;

            if envelope.ok {
                return envelope
                    .result
                    .ok_or_else(|| BridgeError::sink(format!("{method} returned no result")));
            }

            let description = envelope
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));
            let retry_after = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            if envelope.error_code == Some(429)
                && !retried
                && let Some(delay) = retry_after.filter(|d| *d <= MAX_RETRY_AFTER)
            {
                warn!(method, retry_after_secs = delay.as_secs(), "flood control, retrying");
                tokio::time::sleep(delay).await;
                retried = true;
                continue;
            }

            debug!(method, error_code = ?envelope.error_code, %description, "bot api call failed");
            metrics::counter!("threadlink_sink_api_errors_total", "method" => method.to_string())
                .increment(1);
            return Err(api_error(method, &description));
        }
    }

    /// Downloads a file by the `file_path` returned from `getFile`.
    pub async fn download(&self, file_path: &str) -> Result<Vec<u8>, BridgeError> {
        let url = format!("{}/{file_path}", self.file_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("download", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::sink(format!("file download returned {status}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("download", e))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_topic_descriptions_are_recognized() {
        assert!(is_thread_not_found("Bad Request: message thread not found"));
        assert!(is_thread_not_found("Bad Request: TOPIC_DELETED"));
        assert!(is_thread_not_found("Bad Request: TOPIC_ID_INVALID"));
        assert!(!is_thread_not_found("Bad Request: chat not found"));
    }

    #[test]
    fn api_error_maps_only_missing_topics_to_healing() {
        assert!(api_error("sendMessage", "Bad Request: message thread not found").is_thread_not_found());
        let other = api_error("sendMessage", "Forbidden: bot was kicked");
        assert!(!other.is_thread_not_found());
        assert_eq!(other.to_string(), "sink error: sendMessage failed: Forbidden: bot was kicked");
    }

    #[test]
    fn envelope_decodes_errors_with_retry_after() {
        let json = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 3","parameters":{"retry_after":3}}"#;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error_code, Some(429));
        assert_eq!(envelope.parameters.and_then(|p| p.retry_after), Some(3));
    }
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event webhook the sidecar pushes Source events to.
//!
//! Every `POST /events` body must carry an `X-Threadlink-Signature:
//! sha256=<hex>` header holding the HMAC-SHA256 of the raw body under the
//! shared webhook secret. Unsigned or mis-signed requests are rejected with
//! 401 before the body is parsed. The same server exposes `GET /health` and,
//! when a renderer is installed, `GET /metrics`.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use threadlink_core::source::SourceEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-threadlink-signature";

/// Renders the process metrics in Prometheus text format.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    pub secret: Arc<[u8]>,
    pub events: mpsc::Sender<SourceEvent>,
    pub metrics_render: Option<MetricsRender>,
}

impl std::fmt::Debug for WebhookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState")
            .field("secret", &"[redacted]")
            .field("metrics_render", &self.metrics_render.is_some())
            .finish()
    }
}

/// Signature header value for `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a `sha256=<hex>` signature.
pub fn verify_signature(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
    let Some(digest_hex) = header.map(str::trim).and_then(|h| h.strip_prefix("sha256=")) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Builds the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/events", post(post_events))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

async fn post_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&state.secret, &body, signature) {
        warn!(signed = signature.is_some(), "rejected webhook event with bad signature");
        metrics::counter!("threadlink_webhook_rejected_total").increment(1);
        return StatusCode::UNAUTHORIZED;
    }

    let event: SourceEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "undecodable webhook event");
            return StatusCode::BAD_REQUEST;
        }
    };

    match state.events.send(event).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn get_health() -> StatusCode {
    StatusCode::OK
}

async fn get_metrics(State(state): State<WebhookState>) -> impl IntoResponse {
    match &state.metrics_render {
        Some(render) => (StatusCode::OK, render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"webhook-secret";

    fn state() -> (WebhookState, mpsc::Receiver<SourceEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (
            WebhookState {
                secret: Arc::from(SECRET),
                events: tx,
                metrics_render: Some(Arc::new(|| "threadlink_up 1\n".to_string())),
            },
            rx,
        )
    }

    fn event_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event": "message",
            "data": {
                "key": { "remoteJid": "4915112345678@s.whatsapp.net", "id": "ABC" },
                "message": { "conversation": "hi" }
            }
        }))
        .unwrap()
    }

    fn request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/events");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[test]
    fn signature_round_trip() {
        let sig = sign(SECRET, b"payload");
        assert!(sig.starts_with("sha256="));
        assert!(verify_signature(SECRET, b"payload", Some(&sig)));
        assert!(!verify_signature(SECRET, b"tampered", Some(&sig)));
        assert!(!verify_signature(b"other", b"payload", Some(&sig)));
        assert!(!verify_signature(SECRET, b"payload", Some("sha256=zz")));
        assert!(!verify_signature(SECRET, b"payload", None));
    }

    #[tokio::test]
    async fn unsigned_event_is_rejected() {
        let (state, mut rx) = state();
        let response = router(state)
            .oneshot(request(event_body(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mis_signed_event_is_rejected() {
        let (state, mut rx) = state();
        let signature = sign(b"wrong-secret", &event_body());
        let response = router(state)
            .oneshot(request(event_body(), Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn signed_event_is_forwarded() {
        let (state, mut rx) = state();
        let body = event_body();
        let signature = sign(SECRET, &body);
        let response = router(state)
            .oneshot(request(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        match rx.try_recv().unwrap() {
            SourceEvent::Message(message) => assert_eq!(message.text(), Some("hi")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn signed_garbage_is_a_bad_request() {
        let (state, _rx) = state();
        let body = b"{\"event\":\"nope\"}".to_vec();
        let signature = sign(SECRET, &body);
        let response = router(state)
            .oneshot(request(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_are_rendered() {
        let (state, _rx) = state();
        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"threadlink_up 1\n");
    }
}

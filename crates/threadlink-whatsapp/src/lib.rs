// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Source adapter for the Threadlink bridge.
//!
//! The Source session lives in a sidecar process. [`WhatsAppSource`] calls
//! the sidecar's HTTP API for everything the bridge sends or looks up, and
//! runs a signed webhook the sidecar pushes events into.

pub mod client;
pub mod webhook;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use threadlink_config::model::WhatsAppConfig;
use threadlink_core::source::{
    Contact, GroupMetadata, MediaKind, MediaMessage, MessageKey, OutgoingContent, SendOptions,
    SourceEvent,
};
use threadlink_core::{
    AdapterType, BridgeError, ConversationId, HealthStatus, MediaStream, PluginAdapter,
    PresenceKind, SourceClient,
};

use crate::client::SidecarClient;
use crate::webhook::{MetricsRender, WebhookState};

/// Capacity of the webhook → engine event channel.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Deserialize)]
struct MeResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
}

/// Encodes outgoing content in the sidecar's message-content shape.
pub fn content_json(content: &OutgoingContent) -> Value {
    match content {
        OutgoingContent::Text { text } => json!({ "text": text }),
        OutgoingContent::Image {
            data,
            mimetype,
            caption,
        } => json!({
            "image": BASE64.encode(data),
            "mimetype": mimetype,
            "caption": caption,
        }),
        OutgoingContent::Video {
            data,
            mimetype,
            caption,
            gif_playback,
            video_note,
        } => json!({
            "video": BASE64.encode(data),
            "mimetype": mimetype,
            "caption": caption,
            "gifPlayback": gif_playback,
            "ptv": video_note,
        }),
        OutgoingContent::Audio {
            data,
            mimetype,
            voice_note,
        } => json!({
            "audio": BASE64.encode(data),
            "mimetype": mimetype,
            "ptt": voice_note,
        }),
        OutgoingContent::Document {
            data,
            mimetype,
            file_name,
            caption,
        } => json!({
            "document": BASE64.encode(data),
            "mimetype": mimetype,
            "fileName": file_name,
            "caption": caption,
        }),
        OutgoingContent::Sticker { data } => json!({ "sticker": BASE64.encode(data) }),
        OutgoingContent::Location {
            latitude,
            longitude,
            name,
            address,
        } => json!({
            "location": {
                "degreesLatitude": latitude,
                "degreesLongitude": longitude,
                "name": name,
                "address": address,
            }
        }),
        OutgoingContent::Contact {
            display_name,
            vcard,
        } => json!({
            "contacts": {
                "displayName": display_name,
                "contacts": [{ "vcard": vcard }],
            }
        }),
    }
}

/// Source adapter backed by the sidecar.
pub struct WhatsAppSource {
    client: SidecarClient,
    webhook_bind: String,
    secret: Arc<[u8]>,
    events_tx: mpsc::Sender<SourceEvent>,
    events_rx: Mutex<mpsc::Receiver<SourceEvent>>,
    own_id: RwLock<Option<String>>,
    server: Mutex<Option<JoinHandle<()>>>,
    metrics_render: Option<MetricsRender>,
}

impl WhatsAppSource {
    /// Creates a new Source adapter.
    ///
    /// Requires `config.webhook_secret` to be set.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, BridgeError> {
        let secret = config
            .webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BridgeError::Config("whatsapp.webhook_secret is required for the Source webhook".into())
            })?;
        let client = SidecarClient::new(&config.sidecar_url, config.api_token.as_deref())?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        Ok(Self {
            client,
            webhook_bind: config.webhook_bind.clone(),
            secret: Arc::from(secret.as_bytes()),
            events_tx,
            events_rx: Mutex::new(events_rx),
            own_id: RwLock::new(None),
            server: Mutex::new(None),
            metrics_render: None,
        })
    }

    /// Serves Prometheus metrics on the webhook's `GET /metrics`.
    pub fn with_metrics_render(mut self, render: MetricsRender) -> Self {
        self.metrics_render = Some(render);
        self
    }

    fn webhook_state(&self) -> WebhookState {
        WebhookState {
            secret: self.secret.clone(),
            events: self.events_tx.clone(),
            metrics_render: self.metrics_render.clone(),
        }
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppSource {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        match self.client.get::<Value>("/health").await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("sidecar unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        if let Some(handle) = self.server.lock().await.take() {
            handle.abort();
            debug!("Source webhook stopped");
        }
        Ok(())
    }
}

#[async_trait]
impl SourceClient for WhatsAppSource {
    async fn connect(&self) -> Result<(), BridgeError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Ok(());
        }

        let me: MeResponse = self.client.get("/v1/me").await?;
        if let Ok(mut own_id) = self.own_id.write() {
            *own_id = Some(me.id.clone());
        }

        let listener = tokio::net::TcpListener::bind(&self.webhook_bind)
            .await
            .map_err(|e| BridgeError::Source {
                message: format!("failed to bind webhook to {}: {e}", self.webhook_bind),
                source: Some(Box::new(e)),
            })?;
        info!(bind = %self.webhook_bind, own_id = %me.id, "Source webhook listening");

        let app = webhook::router(self.webhook_state());
        *server = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "Source webhook server failed");
            }
        }));
        Ok(())
    }

    async fn next_event(&self) -> Result<SourceEvent, BridgeError> {
        self.events_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| BridgeError::source_failure("Source event channel closed"))
    }

    fn own_id(&self) -> Option<String> {
        self.own_id.read().ok().and_then(|id| id.clone())
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        content: OutgoingContent,
        options: SendOptions,
    ) -> Result<Option<String>, BridgeError> {
        let quoted = options.quoted.map(|q| {
            json!({
                "key": q.key,
                "message": { "conversation": q.text.unwrap_or_default() },
            })
        });
        let body = json!({
            "jid": conversation,
            "content": content_json(&content),
            "quoted": quoted,
        });
        let sent: SendResponse = self.client.post("/v1/messages/send", &body).await?;
        debug!(conversation = %conversation, kind = content.kind(), id = ?sent.id, "sent to Source");
        Ok(sent.id)
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), BridgeError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.client
            .post_unit("/v1/messages/read", &json!({ "keys": keys }))
            .await
    }

    async fn send_presence(
        &self,
        conversation: &ConversationId,
        presence: PresenceKind,
    ) -> Result<(), BridgeError> {
        self.client
            .post_unit(
                "/v1/presence",
                &json!({ "jid": conversation, "presence": presence }),
            )
            .await
    }

    async fn profile_picture_url(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError> {
        let response: UrlResponse = self
            .client
            .post("/v1/profile-picture", &json!({ "jid": conversation }))
            .await?;
        Ok(response.url.filter(|u| !u.is_empty()))
    }

    async fn group_metadata(
        &self,
        conversation: &ConversationId,
    ) -> Result<GroupMetadata, BridgeError> {
        self.client
            .post("/v1/groups/metadata", &json!({ "jid": conversation }))
            .await
    }

    async fn fetch_status(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError> {
        let response: StatusResponse = self
            .client
            .post("/v1/status", &json!({ "jid": conversation }))
            .await?;
        Ok(response.status.filter(|s| !s.trim().is_empty()))
    }

    async fn download_media(
        &self,
        media: &MediaMessage,
        kind: MediaKind,
    ) -> Result<MediaStream, BridgeError> {
        if media.media_key.is_none() {
            return Err(BridgeError::Media(format!(
                "{kind} message carries no media key"
            )));
        }
        self.client
            .post_stream(
                "/v1/media/download",
                &json!({ "message": media, "type": kind }),
            )
            .await
    }

    async fn contacts(&self) -> Result<Vec<Contact>, BridgeError> {
        self.client.get("/v1/contacts").await
    }
}

// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping store: the bridge's single source of truth.
//!
//! Holds conversation to topic mappings, participant profiles, the contact
//! directory and the content filters. Every durable mutation is applied to a
//! copy of the tables, written through to the [`DocumentStore`] and only then
//! swapped in, all under the write lock. A failed save leaves the tables as
//! they were.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use threadlink_core::{BridgeError, ConversationId, DocumentStore, TopicId};

/// Namespace of the mapping document in the [`DocumentStore`].
pub const MAPPINGS_NAMESPACE: &str = "mappings";

/// Current shape of the persisted mapping document.
pub const SCHEMA_VERSION: u32 = 2;

/// The topic that mirrors a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMapping {
    pub topic_id: TopicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub last_activity: DateTime<Utc>,
}

impl ConversationMapping {
    pub fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            profile_picture_url: None,
            last_activity: Utc::now(),
        }
    }
}

/// What the bridge knows about a message author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    #[serde(default)]
    pub name: Option<String>,
    pub phone: String,
    pub first_seen: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
}

/// Lowercase prefixes that block outbound text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    prefixes: BTreeSet<String>,
}

impl FilterSet {
    /// Adds a prefix. Returns `false` for blank or already present prefixes.
    pub fn insert(&mut self, prefix: &str) -> bool {
        let prefix = prefix.trim().to_lowercase();
        !prefix.is_empty() && self.prefixes.insert(prefix)
    }

    pub fn clear(&mut self) {
        self.prefixes.clear();
    }

    /// Returns `true` if the trimmed, lower-cased text starts with any prefix.
    pub fn matches(&self, text: &str) -> bool {
        let normalized = text.trim().to_lowercase();
        self.prefixes.iter().any(|p| normalized.starts_with(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// A name that carries no information beyond the phone number itself.
pub fn is_placeholder_name(name: &str, phone: &str) -> bool {
    let name = name.trim();
    name == phone || name.starts_with('+') || name.chars().count() < 3
}

/// Superset merge rule for the contact directory. Returns the name to store,
/// or `None` if the existing entry must be kept.
pub fn merge_contact_name(existing: Option<&str>, incoming: &str, phone: &str) -> Option<String> {
    let incoming = incoming.trim();
    if incoming.is_empty() || existing == Some(incoming) {
        return None;
    }
    match existing {
        None => Some(incoming.to_string()),
        Some(current) if is_placeholder_name(current, phone) => Some(incoming.to_string()),
        Some(_) if is_placeholder_name(incoming, phone) => None,
        Some(_) => Some(incoming.to_string()),
    }
}

/// A stored chat mapping as found on disk. Older documents stored the topic id
/// as a bare integer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PersistedChatMapping {
    Legacy(i64),
    Current(ConversationMapping),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedDocument {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    chat_mappings: BTreeMap<String, PersistedChatMapping>,
    #[serde(default)]
    user_mappings: BTreeMap<String, ParticipantProfile>,
    #[serde(default)]
    contact_mappings: BTreeMap<String, String>,
    #[serde(default)]
    filters: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct MappingState {
    chats: HashMap<ConversationId, ConversationMapping>,
    topics: HashMap<TopicId, ConversationId>,
    participants: HashMap<String, ParticipantProfile>,
    contacts: HashMap<String, String>,
    filters: FilterSet,
}

impl MappingState {
    /// Applies the persisted document, returning the number of legacy records migrated.
    fn from_document(doc: PersistedDocument) -> (Self, usize) {
        let mut state = MappingState::default();
        let mut migrated = 0;
        for (id, record) in doc.chat_mappings {
            let mapping = match record {
                PersistedChatMapping::Legacy(topic) => {
                    migrated += 1;
                    ConversationMapping::new(TopicId(topic))
                }
                PersistedChatMapping::Current(mapping) => mapping,
            };
            state.insert_mapping(ConversationId::new(id), mapping);
        }
        state.participants = doc.user_mappings.into_iter().collect();
        state.contacts = doc.contact_mappings.into_iter().collect();
        for filter in &doc.filters {
            state.filters.insert(filter);
        }
        (state, migrated)
    }

    fn to_document(&self) -> PersistedDocument {
        PersistedDocument {
            schema_version: SCHEMA_VERSION,
            chat_mappings: self
                .chats
                .iter()
                .map(|(id, m)| (id.to_string(), PersistedChatMapping::Current(m.clone())))
                .collect(),
            user_mappings: self
                .participants
                .iter()
                .map(|(id, p)| (id.clone(), p.clone()))
                .collect(),
            contact_mappings: self
                .contacts
                .iter()
                .map(|(phone, name)| (phone.clone(), name.clone()))
                .collect(),
            filters: self.filters.iter().map(str::to_string).collect(),
        }
    }

    /// Inserts a mapping, evicting any other conversation that held the same topic.
    fn insert_mapping(&mut self, conversation: ConversationId, mapping: ConversationMapping) {
        if let Some(previous) = self.chats.get(&conversation) {
            self.topics.remove(&previous.topic_id);
        }
        if let Some(owner) = self.topics.get(&mapping.topic_id).cloned()
            && owner != conversation
        {
            self.chats.remove(&owner);
        }
        self.topics.insert(mapping.topic_id, conversation.clone());
        self.chats.insert(conversation, mapping);
    }
}

/// Shared handle to the mapping tables.
#[derive(Clone)]
pub struct MappingStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state: RwLock<MappingState>,
    documents: Arc<dyn DocumentStore>,
}

impl MappingStore {
    /// Loads the persisted document, migrating legacy records once.
    pub async fn load(documents: Arc<dyn DocumentStore>) -> Result<Self, BridgeError> {
        let (state, needs_save) = match documents.load(MAPPINGS_NAMESPACE).await? {
            Some(value) => {
                let doc: PersistedDocument =
                    serde_json::from_value(value).map_err(|e| BridgeError::Storage {
                        source: Box::new(e),
                    })?;
                let version = doc.schema_version;
                let (state, migrated) = MappingState::from_document(doc);
                if migrated > 0 {
                    info!(migrated, "migrated legacy chat mappings");
                }
                (state, migrated > 0 || version < SCHEMA_VERSION)
            }
            None => (MappingState::default(), false),
        };

        debug!(
            chats = state.chats.len(),
            participants = state.participants.len(),
            contacts = state.contacts.len(),
            filters = state.filters.len(),
            "mapping store loaded"
        );

        let store = Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                documents,
            }),
        };
        if needs_save {
            store.flush().await?;
        }
        Ok(store)
    }

    async fn persist(&self, state: &MappingState) -> Result<(), BridgeError> {
        let value = serde_json::to_value(state.to_document()).map_err(|e| BridgeError::Storage {
            source: Box::new(e),
        })?;
        self.inner.documents.save(MAPPINGS_NAMESPACE, &value).await
    }

    /// Applies `change` to a copy of the state, persists the copy and swaps it in.
    ///
    /// `change` returns `None` when it changed nothing; nothing is written then.
    async fn commit<R>(
        &self,
        change: impl FnOnce(&mut MappingState) -> Option<R>,
    ) -> Result<Option<R>, BridgeError> {
        let mut state = self.inner.state.write().await;
        let mut next = state.clone();
        let Some(outcome) = change(&mut next) else {
            return Ok(None);
        };
        self.persist(&next).await?;
        *state = next;
        Ok(Some(outcome))
    }

    /// Writes the current state to the document store.
    pub async fn flush(&self) -> Result<(), BridgeError> {
        let state = self.inner.state.write().await;
        self.persist(&state).await
    }

    pub async fn topic_for(&self, conversation: &ConversationId) -> Option<TopicId> {
        let state = self.inner.state.read().await;
        state.chats.get(conversation).map(|m| m.topic_id)
    }

    pub async fn mapping(&self, conversation: &ConversationId) -> Option<ConversationMapping> {
        let state = self.inner.state.read().await;
        state.chats.get(conversation).cloned()
    }

    /// Reverse lookup from topic to conversation.
    pub async fn conversation_for_topic(&self, topic: TopicId) -> Option<ConversationId> {
        let state = self.inner.state.read().await;
        state.topics.get(&topic).cloned()
    }

    pub async fn all_mappings(&self) -> Vec<(ConversationId, ConversationMapping)> {
        let state = self.inner.state.read().await;
        let mut all: Vec<_> = state
            .chats
            .iter()
            .map(|(id, m)| (id.clone(), m.clone()))
            .collect();
        all.sort_by_key(|(_, m)| m.topic_id);
        all
    }

    pub async fn set_mapping(
        &self,
        conversation: &ConversationId,
        topic: TopicId,
    ) -> Result<(), BridgeError> {
        self.commit(|state| {
            state.insert_mapping(conversation.clone(), ConversationMapping::new(topic));
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Removes the mapping for `conversation` if it still points at `stale`.
    ///
    /// Returns `false` when the mapping was already gone or replaced.
    pub async fn remove_mapping_if(
        &self,
        conversation: &ConversationId,
        stale: TopicId,
    ) -> Result<bool, BridgeError> {
        let removed = self
            .commit(|state| match state.chats.get(conversation) {
                Some(mapping) if mapping.topic_id == stale => {
                    state.chats.remove(conversation);
                    state.topics.remove(&stale);
                    Some(())
                }
                _ => None,
            })
            .await?;
        Ok(removed.is_some())
    }

    /// Bumps the last activity timestamp of a mapped conversation.
    pub async fn touch_activity(&self, conversation: &ConversationId) -> Result<(), BridgeError> {
        self.commit(|state| {
            let mapping = state.chats.get_mut(conversation)?;
            mapping.last_activity = Utc::now();
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn set_profile_picture(
        &self,
        conversation: &ConversationId,
        url: Option<String>,
    ) -> Result<(), BridgeError> {
        self.commit(|state| {
            let mapping = state.chats.get_mut(conversation)?;
            if mapping.profile_picture_url == url {
                return None;
            }
            mapping.profile_picture_url = url;
            Some(())
        })
        .await?;
        Ok(())
    }

    /// Records a message from `participant`, creating its profile on first sight.
    pub async fn record_participant(
        &self,
        participant: &str,
        phone: &str,
        name: Option<&str>,
    ) -> Result<(), BridgeError> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        self.commit(|state| {
            let profile = state
                .participants
                .entry(participant.to_string())
                .or_insert_with(|| ParticipantProfile {
                    name: None,
                    phone: phone.to_string(),
                    first_seen: Utc::now(),
                    message_count: 0,
                });
            profile.message_count += 1;
            if let Some(name) = name {
                profile.name = Some(name.to_string());
            }
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn participant(&self, participant: &str) -> Option<ParticipantProfile> {
        let state = self.inner.state.read().await;
        state.participants.get(participant).cloned()
    }

    pub async fn contact_name(&self, phone: &str) -> Option<String> {
        let state = self.inner.state.read().await;
        state.contacts.get(phone).cloned()
    }

    /// Merges a batch of `(phone, name)` pairs and persists once.
    ///
    /// Returns the entries whose stored name changed.
    pub async fn merge_contacts(
        &self,
        entries: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Vec<(String, String)>, BridgeError> {
        let changed = self
            .commit(|state| {
                let mut changed = Vec::new();
                for (phone, name) in entries {
                    let existing = state.contacts.get(&phone).map(String::as_str);
                    if let Some(merged) = merge_contact_name(existing, &name, &phone) {
                        state.contacts.insert(phone.clone(), merged.clone());
                        changed.push((phone, merged));
                    }
                }
                (!changed.is_empty()).then_some(changed)
            })
            .await?;
        Ok(changed.unwrap_or_default())
    }

    /// Returns `false` if the filter was blank or already present.
    pub async fn add_filter(&self, prefix: &str) -> Result<bool, BridgeError> {
        let added = self
            .commit(|state| state.filters.insert(prefix).then_some(()))
            .await?;
        Ok(added.is_some())
    }

    pub async fn clear_filters(&self) -> Result<(), BridgeError> {
        self.commit(|state| {
            if state.filters.is_empty() {
                return None;
            }
            state.filters.clear();
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn filters(&self) -> Vec<String> {
        let state = self.inner.state.read().await;
        state.filters.iter().map(str::to_string).collect()
    }

    pub async fn is_blocked(&self, text: &str) -> bool {
        let state = self.inner.state.read().await;
        state.filters.matches(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_names() {
        assert!(is_placeholder_name("4915112345678", "4915112345678"));
        assert!(is_placeholder_name("+49 151 123", "4915112345678"));
        assert!(is_placeholder_name("Al", "4915112345678"));
        assert!(!is_placeholder_name("Alice", "4915112345678"));
    }

    #[test]
    fn merge_keeps_real_name_over_placeholder() {
        assert_eq!(merge_contact_name(Some("Alice"), "+4915", "4915"), None);
        assert_eq!(
            merge_contact_name(Some("4915"), "Alice", "4915"),
            Some("Alice".to_string())
        );
        assert_eq!(
            merge_contact_name(None, "+4915", "4915"),
            Some("+4915".to_string())
        );
        assert_eq!(
            merge_contact_name(Some("Alice"), "Alice B.", "4915"),
            Some("Alice B.".to_string())
        );
        assert_eq!(merge_contact_name(Some("Alice"), "Alice", "4915"), None);
    }

    #[test]
    fn filter_set_matches_trimmed_lowercase_prefix() {
        let mut filters = FilterSet::default();
        assert!(filters.insert("  Buy Now "));
        assert!(!filters.insert("buy now"));
        assert!(!filters.insert("   "));
        assert!(filters.matches("  BUY NOW and save"));
        assert!(!filters.matches("please buy now"));
        filters.clear();
        assert!(!filters.matches("buy now"));
    }

    #[test]
    fn legacy_records_are_migrated_to_current_shape() {
        let doc: PersistedDocument = serde_json::from_value(serde_json::json!({
            "chatMappings": {
                "1@s.whatsapp.net": 12,
                "2@s.whatsapp.net": { "topicId": 13, "profilePictureUrl": "https://pp/2" }
            },
            "filters": ["Spam"]
        }))
        .unwrap();
        let (state, migrated) = MappingState::from_document(doc);
        assert_eq!(migrated, 1);
        let legacy = &state.chats[&ConversationId::new("1@s.whatsapp.net")];
        assert_eq!(legacy.topic_id, TopicId(12));
        assert!(legacy.profile_picture_url.is_none());
        assert!(state.filters.matches("spam!"));

        let rendered = serde_json::to_value(state.to_document()).unwrap();
        assert_eq!(rendered["schemaVersion"], SCHEMA_VERSION);
        assert_eq!(rendered["chatMappings"]["1@s.whatsapp.net"]["topicId"], 12);
    }

    #[test]
    fn topic_reuse_evicts_previous_owner() {
        let mut state = MappingState::default();
        let a = ConversationId::new("a@s.whatsapp.net");
        let b = ConversationId::new("b@s.whatsapp.net");
        state.insert_mapping(a.clone(), ConversationMapping::new(TopicId(5)));
        state.insert_mapping(b.clone(), ConversationMapping::new(TopicId(5)));
        assert!(!state.chats.contains_key(&a));
        assert_eq!(state.topics[&TopicId(5)], b);
    }

    #[test]
    fn remapping_drops_old_reverse_entry() {
        let mut state = MappingState::default();
        let a = ConversationId::new("a@s.whatsapp.net");
        state.insert_mapping(a.clone(), ConversationMapping::new(TopicId(5)));
        state.insert_mapping(a.clone(), ConversationMapping::new(TopicId(6)));
        assert!(!state.topics.contains_key(&TopicId(5)));
        assert_eq!(state.topics[&TopicId(6)], a);
    }
}

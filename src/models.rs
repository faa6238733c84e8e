//! Request and response payloads of the memory-assistant API.
//!
//! List fields default to empty when the server omits them, and optional
//! request fields are left out of the JSON entirely when unset.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct HealthResponse {
    pub status: String,
}

/// Reachability of one backend store.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ServiceStatus {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ReadyResponse {
    pub status: String,
    #[serde(default)]
    pub neo4j: Option<ServiceStatus>,
    #[serde(default)]
    pub qdrant: Option<ServiceStatus>,
}

// Memories

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Citation {
    pub source_id: String,
    #[serde(default)]
    pub quote: Option<String>,
}

/// Evidence backing a memory.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MemorySupport {
    pub source_id: String,
    #[serde(default)]
    pub quotes: Vec<String>,
}

/// Relationship from one memory to another, such as `supports` or `contradicts`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MemoryLink {
    /// `memory_id` of the linked memory.
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Contradiction {
    pub claim_a: String,
    pub claim_b: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MemoryItem {
    pub memory_id: String,
    pub kind: String,
    pub summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default)]
    pub support: Vec<MemorySupport>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub valid_from: Option<String>,
    #[serde(default)]
    pub valid_to: Option<String>,
    #[serde(default)]
    pub links: Vec<MemoryLink>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MemoryListResponse {
    #[serde(default)]
    pub items: Vec<MemoryItem>,
}

/// Filters for listing memories.
///
/// `include_inactive` is only sent when set, and `limit` is always sent.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    pub limit: u32,
    pub kind: Option<String>,
    pub search: Option<String>,
    pub include_inactive: bool,
    pub as_of: Option<String>,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            kind: None,
            search: None,
            include_inactive: false,
            as_of: None,
        }
    }
}

/// Partial update of a memory. Unset fields are left untouched on the server.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MemoryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

// Chat

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Answers as of a past point in time (ISO 8601).
    pub fn with_as_of(mut self, timestamp: impl Into<String>) -> Self {
        self.as_of = Some(timestamp.into());
        self
    }

    /// Searches session-scoped memories in addition to global ones.
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub used_memory_ids: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<Contradiction>,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
    #[serde(default)]
    pub search_latency_ms: f64,
    #[serde(default)]
    pub total_latency_ms: f64,
}

// Ingest

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct IngestRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl IngestRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Scopes the extracted memories to a session, optionally for one agent.
    pub fn in_session(mut self, session_id: impl Into<String>, agent_id: Option<String>) -> Self {
        self.session_id = Some(session_id.into());
        self.agent_id = agent_id;
        self
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ExtractedEntity {
    pub entity_id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub canonical_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Values involved when an ingested memory was merged into an existing one.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MergeInfo {
    pub existing_value: String,
    pub new_value: String,
    pub merged_value: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ExtractedMemory {
    pub memory_id: String,
    pub kind: String,
    pub summary: String,
    #[serde(default)]
    pub entity_ids: Vec<String>,
    #[serde(default = "default_extracted_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub evidence_quotes: Vec<String>,
    #[serde(default)]
    pub links: Vec<MemoryLink>,
    /// One of `ADD`, `UPDATE`, `KEEP`, `MERGE` or `DELETE`.
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub merge_info: Option<MergeInfo>,
}

fn default_extracted_confidence() -> f64 {
    0.6
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct IngestResponse {
    pub source_id: String,
    #[serde(default)]
    pub chunks: u32,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub memories: Vec<ExtractedMemory>,
    #[serde(default)]
    pub embedding_failed: Option<bool>,
}

// Sessions

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub claim_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionQuery {
    pub agent_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for SessionQuery {
    fn default() -> Self {
        Self {
            agent_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub total: u64,
}

// API keys

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_days: Option<u32>,
}

impl CreateKeyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct KeyUsageStats {
    #[serde(default)]
    pub calls: u64,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
}

/// An API key as listed by the server. The secret itself is never included.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ApiKeyItem {
    pub key_id: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub last_used_at: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub usage: KeyUsageStats,
}

/// A newly created key. `secret_key` is only ever returned here.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CreateKeyResponse {
    pub key_id: String,
    pub secret_key: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct KeyListResponse {
    #[serde(default)]
    pub keys: Vec<ApiKeyItem>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct UsageSummary {
    pub total_calls: u64,
    pub total_tokens_input: u64,
    pub total_tokens_output: u64,
    pub total_cost_usd: f64,
    pub period_start: String,
    pub period_end: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct EndpointUsage {
    pub endpoint: String,
    pub calls: u64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct UsageResponse {
    pub summary: UsageSummary,
    #[serde(default)]
    pub by_endpoint: Vec<EndpointUsage>,
}

/// One quota counter. `-1` in `limit` or `remaining` means unlimited.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct QuotaLimit {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

impl QuotaLimit {
    pub fn is_unlimited(&self) -> bool {
        self.limit < 0
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct QuotaResponse {
    pub plan: String,
    pub month: String,
    pub chat: QuotaLimit,
    pub ingest: QuotaLimit,
    pub memories: QuotaLimit,
    pub api_keys: QuotaLimit,
}

// Conversations

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct CreateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct Message {
    pub message_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub citations: Vec<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A message to store, either one at a time or in a bulk sync.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct MessageInput {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Value>>,
}

impl MessageInput {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            citations: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageQuery {
    pub limit: u32,
    /// Only return messages older than this message id.
    pub before_id: Option<String>,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            before_id: None,
        }
    }
}

// Speech

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct SttResponse {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct TtsRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: None,
        }
    }
}

// Consolidation

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ConsolidationStatusResponse {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub stats: Map<String, Value>,
    #[serde(default)]
    pub last_consolidation: Option<ConsolidationResultResponse>,
}

/// Outcome of a consolidation run. `completed_at` is unset while a job is running.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ConsolidationResultResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub clusters_found: u64,
    #[serde(default)]
    pub clusters_abstracted: u64,
    #[serde(default)]
    pub claims_consolidated: u64,
    #[serde(default)]
    pub claims_archived: u64,
    #[serde(default)]
    pub contradictions_found: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ConsolidationResultResponse {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ConsolidationTriggerResponse {
    pub started: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_skips_unset_fields() {
        let request = ChatRequest::new("What is my favorite color?");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"question": "What is my favorite color?"})
        );

        let request = ChatRequest::new("q")
            .with_language("fa")
            .with_as_of("2024-01-01T00:00:00Z")
            .in_session("sess_1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "question": "q",
                "language": "fa",
                "as_of": "2024-01-01T00:00:00Z",
                "session_id": "sess_1"
            })
        );
    }

    #[test]
    fn test_chat_response_defaults() {
        let response: ChatResponse = serde_json::from_value(json!({
            "answer": "Your favorite color is blue.",
            "citations": [{"source_id": "src_123", "quote": "I love blue"}],
            "used_memory_ids": ["mem_123", "mem_456"]
        }))
        .unwrap();

        assert_eq!(response.answer, "Your favorite color is blue.");
        assert_eq!(response.citations[0].quote.as_deref(), Some("I love blue"));
        assert_eq!(response.used_memory_ids.len(), 2);
        assert!(response.contradictions.is_empty());
        assert_eq!(response.tokens_input, 0);
        assert_eq!(response.total_latency_ms, 0.0);
    }

    #[test]
    fn test_ingest_response() {
        let response: IngestResponse = serde_json::from_value(json!({
            "source_id": "src_abc123",
            "chunks": 3,
            "entities": [
                {"entity_id": "ent_user", "type": "self", "canonical_name": "User", "aliases": []}
            ],
            "memories": [{
                "memory_id": "mem_xyz",
                "kind": "preference",
                "summary": "User likes blue",
                "entity_ids": ["ent_user"],
                "confidence": 0.85,
                "evidence_quotes": ["My favorite color is blue"]
            }]
        }))
        .unwrap();

        assert_eq!(response.chunks, 3);
        assert_eq!(response.entities[0].entity_type, "self");
        assert_eq!(response.memories[0].confidence, 0.85);
        assert_eq!(response.memories[0].decision, None);
        assert_eq!(response.embedding_failed, None);
    }

    #[test]
    fn test_ingest_response_without_chunks() {
        let response: IngestResponse =
            serde_json::from_value(json!({"source_id": "src_1"})).unwrap();
        assert_eq!(response.chunks, 0);
        assert!(response.entities.is_empty());
        assert!(response.memories.is_empty());
    }

    #[test]
    fn test_extracted_memory_default_confidence() {
        let memory: ExtractedMemory = serde_json::from_value(json!({
            "memory_id": "m", "kind": "fact", "summary": "s", "decision": "MERGE",
            "merge_info": {"existing_value": "a", "new_value": "b", "merged_value": "a+b"}
        }))
        .unwrap();
        assert_eq!(memory.confidence, 0.6);
        assert_eq!(memory.merge_info.unwrap().merged_value, "a+b");
    }

    #[test]
    fn test_memory_item() {
        let item: MemoryItem = serde_json::from_value(json!({
            "memory_id": "mem_123",
            "kind": "preference",
            "summary": "User likes coffee",
            "confidence": 0.9,
            "support": [{"source_id": "src_123", "quotes": ["I love coffee"]}],
            "status": "active",
            "key": "pref_beverage",
            "valid_to": null,
            "links": [{"target": "mem_9", "type": "supports", "confidence": 0.7}]
        }))
        .unwrap();

        assert_eq!(item.support[0].quotes, vec!["I love coffee"]);
        assert_eq!(item.key.as_deref(), Some("pref_beverage"));
        assert_eq!(item.valid_to, None);
        assert_eq!(item.links[0].link_type, "supports");
        assert!(item.entity_ids.is_empty());
    }

    #[test]
    fn test_memory_update_is_partial() {
        let update = MemoryUpdate {
            confidence: Some(0.4),
            ..MemoryUpdate::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"confidence": 0.4}));
    }

    #[test]
    fn test_session_metadata_defaults_empty() {
        let session: Session = serde_json::from_value(json!({
            "session_id": "s1", "user_id": "u1", "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(session.metadata.is_empty());
        assert_eq!(session.claim_count, 0);
        assert_eq!(session.agent_id, None);
    }

    #[test]
    fn test_quota_unlimited() {
        let quota: QuotaResponse = serde_json::from_value(json!({
            "plan": "pro",
            "month": "2024-06",
            "chat": {"used": 10, "limit": -1, "remaining": -1},
            "ingest": {"used": 3, "limit": 100, "remaining": 97},
            "memories": {"used": 0, "limit": 1000, "remaining": 1000},
            "api_keys": {"used": 1, "limit": 5, "remaining": 4}
        }))
        .unwrap();
        assert!(quota.chat.is_unlimited());
        assert!(!quota.ingest.is_unlimited());
    }

    #[test]
    fn test_consolidation_result_in_progress() {
        let result: ConsolidationResultResponse =
            serde_json::from_value(json!({"job_id": "job_1", "started_at": "t0"})).unwrap();
        assert!(!result.is_complete());
        assert_eq!(result.clusters_found, 0);

        let status: ConsolidationStatusResponse = serde_json::from_value(json!({
            "enabled": true,
            "schedule": "0 3 * * *",
            "stats": {"episodic": 12},
            "last_consolidation": {"completed_at": "t1", "claims_archived": 4}
        }))
        .unwrap();
        let last = status.last_consolidation.unwrap();
        assert!(last.is_complete());
        assert_eq!(last.claims_archived, 4);
        assert_eq!(status.stats["episodic"], 12);
    }

    #[test]
    fn test_message_input_roles() {
        assert_eq!(
            serde_json::to_value(MessageInput::user("hi")).unwrap(),
            json!({"role": "user", "content": "hi"})
        );
        assert_eq!(MessageInput::assistant("hello").role, "assistant");
    }
}

//! Request descriptors for every API operation.
//!
//! Both clients build their calls from these functions, so paths and query
//! shapes live in one place. Ids are percent-encoded before they go into a path.

use serde_json::{Map, Value, json};
use urlencoding::encode;

use crate::error::Result;
use crate::http::{FileUpload, RequestDescriptor};
use crate::models::{
    ChatRequest, CreateConversationRequest, CreateKeyRequest, CreateSessionRequest, IngestRequest,
    MemoryQuery, MemoryUpdate, MessageInput, MessageQuery, SessionQuery, TtsRequest,
};

/// Form field carrying the audio file of a transcription request.
pub const STT_FIELD: &str = "audio";

/// Upload name used when the caller does not provide one.
pub const DEFAULT_AUDIO_FILE_NAME: &str = "audio.webm";

pub fn health() -> RequestDescriptor {
    RequestDescriptor::get("/health")
}

pub fn ready() -> RequestDescriptor {
    RequestDescriptor::get("/ready")
}

pub fn ingest_chat(request: &IngestRequest) -> Result<RequestDescriptor> {
    RequestDescriptor::post("/ingest/chat").json(request)
}

pub fn chat(request: &ChatRequest) -> Result<RequestDescriptor> {
    RequestDescriptor::post("/chat").json(request)
}

// Memories

pub fn list_memories(query: &MemoryQuery) -> RequestDescriptor {
    RequestDescriptor::get("/memories")
        .query("limit", Some(query.limit))
        .query("kind", query.kind.as_deref())
        .query("search", query.search.as_deref())
        .query("include_inactive", query.include_inactive.then_some(true))
        .query("as_of", query.as_of.as_deref())
}

pub fn get_memory(memory_id: &str) -> RequestDescriptor {
    RequestDescriptor::get(format!("/memories/{}", encode(memory_id)))
}

pub fn update_memory(memory_id: &str, update: &MemoryUpdate) -> Result<RequestDescriptor> {
    RequestDescriptor::patch(format!("/memories/{}", encode(memory_id))).json(update)
}

pub fn delete_memory(memory_id: &str) -> RequestDescriptor {
    RequestDescriptor::delete(format!("/memories/{}", encode(memory_id)))
}

pub fn get_memory_history(memory_id: &str) -> RequestDescriptor {
    RequestDescriptor::get(format!("/memories/{}/history", encode(memory_id)))
}

// Sessions

pub fn create_session(request: &CreateSessionRequest) -> Result<RequestDescriptor> {
    RequestDescriptor::post("/sessions").json(request)
}

pub fn list_sessions(query: &SessionQuery) -> RequestDescriptor {
    RequestDescriptor::get("/sessions")
        .query("limit", Some(query.limit))
        .query("offset", Some(query.offset))
        .query("agent_id", query.agent_id.as_deref())
}

pub fn get_session(session_id: &str) -> RequestDescriptor {
    RequestDescriptor::get(format!("/sessions/{}", encode(session_id)))
}

pub fn update_session(
    session_id: &str,
    metadata: &Map<String, Value>,
) -> Result<RequestDescriptor> {
    RequestDescriptor::patch(format!("/sessions/{}", encode(session_id)))
        .json(&json!({ "metadata": metadata }))
}

/// With `cascade` the session's memories are deleted too; without it they become global.
pub fn delete_session(session_id: &str, cascade: bool) -> RequestDescriptor {
    RequestDescriptor::delete(format!("/sessions/{}", encode(session_id)))
        .query("cascade", Some(cascade))
}

// API keys

pub fn create_api_key(request: &CreateKeyRequest) -> Result<RequestDescriptor> {
    RequestDescriptor::post("/keys").json(request)
}

pub fn list_api_keys() -> RequestDescriptor {
    RequestDescriptor::get("/keys")
}

pub fn revoke_api_key(key_id: &str) -> RequestDescriptor {
    RequestDescriptor::delete(format!("/keys/{}", encode(key_id)))
}

pub fn get_usage(start_date: Option<&str>, end_date: Option<&str>) -> RequestDescriptor {
    RequestDescriptor::get("/keys/usage")
        .query("start_date", start_date)
        .query("end_date", end_date)
}

pub fn get_quota() -> RequestDescriptor {
    RequestDescriptor::get("/keys/quota")
}

// Conversations

pub fn create_conversation(request: &CreateConversationRequest) -> Result<RequestDescriptor> {
    RequestDescriptor::post("/conversations").json(request)
}

pub fn list_conversations(limit: u32, offset: u32) -> RequestDescriptor {
    RequestDescriptor::get("/conversations")
        .query("limit", Some(limit))
        .query("offset", Some(offset))
}

pub fn get_conversation(conversation_id: &str) -> RequestDescriptor {
    RequestDescriptor::get(format!("/conversations/{}", encode(conversation_id)))
}

pub fn update_conversation(conversation_id: &str, title: &str) -> Result<RequestDescriptor> {
    RequestDescriptor::patch(format!("/conversations/{}", encode(conversation_id)))
        .json(&json!({ "title": title }))
}

pub fn delete_conversation(conversation_id: &str) -> RequestDescriptor {
    RequestDescriptor::delete(format!("/conversations/{}", encode(conversation_id)))
}

pub fn delete_all_conversations() -> RequestDescriptor {
    RequestDescriptor::delete("/conversations")
}

pub fn get_messages(conversation_id: &str, query: &MessageQuery) -> RequestDescriptor {
    RequestDescriptor::get(format!(
        "/conversations/{}/messages",
        encode(conversation_id)
    ))
    .query("limit", Some(query.limit))
    .query("before_id", query.before_id.as_deref())
}

pub fn add_message(conversation_id: &str, message: &MessageInput) -> Result<RequestDescriptor> {
    RequestDescriptor::post(format!(
        "/conversations/{}/messages",
        encode(conversation_id)
    ))
    .json(message)
}

pub fn sync_messages(
    conversation_id: &str,
    messages: &[MessageInput],
) -> Result<RequestDescriptor> {
    RequestDescriptor::post(format!("/conversations/{}/sync", encode(conversation_id)))
        .json(&json!({ "messages": messages }))
}

// Speech

/// Transcription upload. The audio goes in the `audio` form field.
pub fn speech_to_text(audio: Vec<u8>, file_name: Option<&str>) -> RequestDescriptor {
    let upload = FileUpload::new(file_name.unwrap_or(DEFAULT_AUDIO_FILE_NAME), audio)
        .with_field_name(STT_FIELD);
    RequestDescriptor::post("/speech/stt").file(upload)
}

/// Speech synthesis. The response is MP3 audio, so the body is returned raw.
pub fn text_to_speech(request: &TtsRequest) -> Result<RequestDescriptor> {
    Ok(RequestDescriptor::post("/speech/tts").json(request)?.raw())
}

// Consolidation

pub fn get_consolidation_status() -> RequestDescriptor {
    RequestDescriptor::get("/consolidation/status")
}

pub fn run_consolidation() -> RequestDescriptor {
    RequestDescriptor::post("/consolidation/run")
}

pub fn trigger_consolidation() -> RequestDescriptor {
    RequestDescriptor::post("/consolidation/trigger")
}

pub fn get_consolidation_result(job_id: &str) -> RequestDescriptor {
    RequestDescriptor::get(format!("/consolidation/result/{}", encode(job_id)))
}

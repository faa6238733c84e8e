//! Blocking client for the memory-assistant API.
//!
//! Mirrors [`crate::MemoryClient`] method for method. Retries sleep the calling
//! thread. Do not use it from inside an async runtime.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api;
use crate::config::{ClientConfig, ProcessEnv};
use crate::error::Result;
use crate::http::{self, BlockingHttpTransport, FileUpload, RequestDescriptor, Transport};
use crate::models::{
    ChatRequest, ChatResponse, ConsolidationResultResponse, ConsolidationStatusResponse,
    ConsolidationTriggerResponse, Conversation, CreateConversationRequest, CreateKeyRequest,
    CreateKeyResponse, CreateSessionRequest, HealthResponse, IngestRequest, IngestResponse,
    KeyListResponse, MemoryItem, MemoryListResponse, MemoryQuery, MemoryUpdate, Message,
    MessageInput, MessageQuery, QuotaResponse, ReadyResponse, Session, SessionListResponse,
    SessionQuery, SttResponse, TtsRequest, UsageResponse,
};
use crate::response::Payload;

type Connector = Box<dyn Fn(&ClientConfig) -> Result<Arc<dyn Transport>> + Send + Sync>;

/// Blocking client. Each call runs on the caller's thread.
pub struct MemoryClient {
    config: ClientConfig,
    connector: Connector,
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl MemoryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Box::new(|config| {
                let transport: Arc<dyn Transport> = Arc::new(BlockingHttpTransport::new(config)?);
                Ok(transport)
            }),
            transport: Mutex::new(None),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env(&ProcessEnv)?)
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let shared = Arc::clone(&transport);
        Ok(Self {
            config,
            connector: Box::new(move |_| Ok(Arc::clone(&shared))),
            transport: Mutex::new(Some(transport)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn close(&self) {
        if self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("Closed connection to {}", self.config.base_url);
        }
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        let mut slot = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transport) = slot.as_ref() {
            return Ok(Arc::clone(transport));
        }
        debug!("Opening connection to {}", self.config.base_url);
        let transport = (self.connector)(&self.config)?;
        *slot = Some(Arc::clone(&transport));
        Ok(transport)
    }

    pub fn send(&self, request: &RequestDescriptor) -> Result<Payload> {
        let transport = self.transport()?;
        let response = http::execute_blocking(transport.as_ref(), &self.config.retry, request)?;
        Payload::from_response(request, response)
    }

    pub fn send_json<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        self.send(request)?.json()
    }

    #[tracing::instrument(skip(self))]
    pub fn health(&self) -> Result<HealthResponse> {
        self.send_json(&api::health())
    }

    #[tracing::instrument(skip(self))]
    pub fn ready(&self) -> Result<ReadyResponse> {
        self.send_json(&api::ready())
    }

    #[tracing::instrument(skip(self, request))]
    pub fn ingest_chat(&self, request: &IngestRequest) -> Result<IngestResponse> {
        self.send_json(&api::ingest_chat(request)?)
    }

    #[tracing::instrument(skip(self, request))]
    pub fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.send_json(&api::chat(request)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn list_memories(&self, query: &MemoryQuery) -> Result<MemoryListResponse> {
        self.send_json(&api::list_memories(query))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_memory(&self, memory_id: &str) -> Result<MemoryItem> {
        self.send_json(&api::get_memory(memory_id))
    }

    #[tracing::instrument(skip(self, update))]
    pub fn update_memory(&self, memory_id: &str, update: &MemoryUpdate) -> Result<Value> {
        self.send_json(&api::update_memory(memory_id, update)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_memory(&self, memory_id: &str) -> Result<Value> {
        self.send_json(&api::delete_memory(memory_id))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_memory_history(&self, memory_id: &str) -> Result<MemoryListResponse> {
        self.send_json(&api::get_memory_history(memory_id))
    }

    #[tracing::instrument(skip(self))]
    pub fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        self.send_json(&api::create_session(request)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn list_sessions(&self, query: &SessionQuery) -> Result<SessionListResponse> {
        self.send_json(&api::list_sessions(query))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        self.send_json(&api::get_session(session_id))
    }

    #[tracing::instrument(skip(self, metadata))]
    pub fn update_session(&self, session_id: &str, metadata: &Map<String, Value>) -> Result<Session> {
        self.send_json(&api::update_session(session_id, metadata)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str, cascade: bool) -> Result<Value> {
        self.send_json(&api::delete_session(session_id, cascade))
    }

    #[tracing::instrument(skip(self, request))]
    pub fn create_api_key(&self, request: &CreateKeyRequest) -> Result<CreateKeyResponse> {
        self.send_json(&api::create_api_key(request)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn list_api_keys(&self) -> Result<KeyListResponse> {
        self.send_json(&api::list_api_keys())
    }

    #[tracing::instrument(skip(self))]
    pub fn revoke_api_key(&self, key_id: &str) -> Result<Value> {
        self.send_json(&api::revoke_api_key(key_id))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_usage(&self, start_date: Option<&str>, end_date: Option<&str>) -> Result<UsageResponse> {
        self.send_json(&api::get_usage(start_date, end_date))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_quota(&self) -> Result<QuotaResponse> {
        self.send_json(&api::get_quota())
    }

    #[tracing::instrument(skip(self))]
    pub fn create_conversation(&self, request: &CreateConversationRequest) -> Result<Conversation> {
        self.send_json(&api::create_conversation(request)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<Conversation>> {
        let conversations: Option<Vec<Conversation>> =
            self.send_json(&api::list_conversations(limit, offset))?;
        Ok(conversations.unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    pub fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.send_json(&api::get_conversation(conversation_id))
    }

    #[tracing::instrument(skip(self))]
    pub fn update_conversation(&self, conversation_id: &str, title: &str) -> Result<Conversation> {
        self.send_json(&api::update_conversation(conversation_id, title)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_conversation(&self, conversation_id: &str) -> Result<Value> {
        self.send_json(&api::delete_conversation(conversation_id))
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_all_conversations(&self) -> Result<Value> {
        self.send_json(&api::delete_all_conversations())
    }

    #[tracing::instrument(skip(self))]
    pub fn get_messages(&self, conversation_id: &str, query: &MessageQuery) -> Result<Vec<Message>> {
        let messages: Option<Vec<Message>> =
            self.send_json(&api::get_messages(conversation_id, query))?;
        Ok(messages.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, message))]
    pub fn add_message(&self, conversation_id: &str, message: &MessageInput) -> Result<Message> {
        self.send_json(&api::add_message(conversation_id, message)?)
    }

    #[tracing::instrument(skip(self, messages))]
    pub fn sync_messages(&self, conversation_id: &str, messages: &[MessageInput]) -> Result<Value> {
        self.send_json(&api::sync_messages(conversation_id, messages)?)
    }

    #[tracing::instrument(skip(self, audio))]
    pub fn speech_to_text(&self, audio: Vec<u8>, file_name: Option<&str>) -> Result<SttResponse> {
        self.send_json(&api::speech_to_text(audio, file_name))
    }

    #[tracing::instrument(skip(self, path))]
    pub fn transcribe_file(&self, path: impl AsRef<Path>) -> Result<SttResponse> {
        let upload = FileUpload::from_path(path.as_ref())?;
        self.speech_to_text(upload.content, Some(&upload.file_name))
    }

    #[tracing::instrument(skip(self, request))]
    pub fn text_to_speech(&self, request: &TtsRequest) -> Result<Vec<u8>> {
        self.send(&api::text_to_speech(request)?)?.into_bytes()
    }

    #[tracing::instrument(skip(self))]
    pub fn get_consolidation_status(&self) -> Result<ConsolidationStatusResponse> {
        self.send_json(&api::get_consolidation_status())
    }

    #[tracing::instrument(skip(self))]
    pub fn run_consolidation(&self) -> Result<ConsolidationResultResponse> {
        self.send_json(&api::run_consolidation())
    }

    #[tracing::instrument(skip(self))]
    pub fn trigger_consolidation(&self) -> Result<ConsolidationTriggerResponse> {
        self.send_json(&api::trigger_consolidation())
    }

    #[tracing::instrument(skip(self))]
    pub fn get_consolidation_result(&self, job_id: &str) -> Result<ConsolidationResultResponse> {
        self.send_json(&api::get_consolidation_result(job_id))
    }
}

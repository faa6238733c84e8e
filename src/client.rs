//! Async client for the memory-assistant API.

use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::api;
use crate::config::{ClientConfig, ProcessEnv};
use crate::error::Result;
use crate::http::{self, AsyncTransport, HttpTransport, RequestDescriptor};
use crate::models::{
    ChatRequest, ChatResponse, ConsolidationResultResponse, ConsolidationStatusResponse,
    ConsolidationTriggerResponse, Conversation, CreateConversationRequest, CreateKeyRequest,
    CreateKeyResponse, CreateSessionRequest, HealthResponse, IngestRequest, IngestResponse,
    KeyListResponse, MemoryItem, MemoryListResponse, MemoryQuery, MemoryUpdate, Message,
    MessageInput, MessageQuery, QuotaResponse, ReadyResponse, Session, SessionListResponse,
    SessionQuery, SttResponse, TtsRequest, UsageResponse,
};
use crate::response::Payload;

type Connector = Box<dyn Fn(&ClientConfig) -> Result<Arc<dyn AsyncTransport>> + Send + Sync>;

/// Async client. Each call runs as one task; retries wait with `tokio::time::sleep`.
///
/// The HTTP connection is opened on first use and released by [`MemoryClient::close`]
/// or when the client is dropped.
pub struct MemoryClient {
    config: ClientConfig,
    connector: Connector,
    transport: Mutex<Option<Arc<dyn AsyncTransport>>>,
}

impl MemoryClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Box::new(|config| {
                let transport: Arc<dyn AsyncTransport> = Arc::new(HttpTransport::new(config)?);
                Ok(transport)
            }),
            transport: Mutex::new(None),
        })
    }

    /// Creates a client from `MEMCLIENT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env(&ProcessEnv)?)
    }

    /// Creates a client that sends every request through `transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn AsyncTransport>) -> Result<Self> {
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

    /// Releases the connection. The next call opens a new one.
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

    fn transport(&self) -> Result<Arc<dyn AsyncTransport>> {
        let mut slot = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(transport) = slot.as_ref() {
            return Ok(Arc::clone(transport));
        }
        debug!("Opening connection to {}", self.config.base_url);
        let transport = (self.connector)(&self.config)?;
        *slot = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Runs one request through the retry loop. Error statuses are raised;
    /// the body comes back as bytes for raw requests and as JSON otherwise.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Payload> {
        let transport = self.transport()?;
        let response = http::execute(transport.as_ref(), &self.config.retry, request).await?;
        Payload::from_response(request, response)
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: &RequestDescriptor) -> Result<T> {
        self.send(request).await?.json()
    }

    #[tracing::instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthResponse> {
        self.send_json(&api::health()).await
    }

    /// Readiness of the service and its backing stores.
    #[tracing::instrument(skip(self))]
    pub async fn ready(&self) -> Result<ReadyResponse> {
        self.send_json(&api::ready()).await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn ingest_chat(&self, request: &IngestRequest) -> Result<IngestResponse> {
        self.send_json(&api::ingest_chat(request)?).await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.send_json(&api::chat(request)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_memories(&self, query: &MemoryQuery) -> Result<MemoryListResponse> {
        self.send_json(&api::list_memories(query)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_memory(&self, memory_id: &str) -> Result<MemoryItem> {
        self.send_json(&api::get_memory(memory_id)).await
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_memory(&self, memory_id: &str, update: &MemoryUpdate) -> Result<Value> {
        self.send_json(&api::update_memory(memory_id, update)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_memory(&self, memory_id: &str) -> Result<Value> {
        self.send_json(&api::delete_memory(memory_id)).await
    }

    /// Earlier versions of a memory, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_memory_history(&self, memory_id: &str) -> Result<MemoryListResponse> {
        self.send_json(&api::get_memory_history(memory_id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        self.send_json(&api::create_session(request)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_sessions(&self, query: &SessionQuery) -> Result<SessionListResponse> {
        self.send_json(&api::list_sessions(query)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        self.send_json(&api::get_session(session_id)).await
    }

    #[tracing::instrument(skip(self, metadata))]
    pub async fn update_session(
        &self,
        session_id: &str,
        metadata: &Map<String, Value>,
    ) -> Result<Session> {
        self.send_json(&api::update_session(session_id, metadata)?)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str, cascade: bool) -> Result<Value> {
        self.send_json(&api::delete_session(session_id, cascade))
            .await
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn create_api_key(&self, request: &CreateKeyRequest) -> Result<CreateKeyResponse> {
        self.send_json(&api::create_api_key(request)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_api_keys(&self) -> Result<KeyListResponse> {
        self.send_json(&api::list_api_keys()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_api_key(&self, key_id: &str) -> Result<Value> {
        self.send_json(&api::revoke_api_key(key_id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_usage(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<UsageResponse> {
        self.send_json(&api::get_usage(start_date, end_date)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_quota(&self) -> Result<QuotaResponse> {
        self.send_json(&api::get_quota()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> Result<Conversation> {
        self.send_json(&api::create_conversation(request)?).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_conversations(&self, limit: u32, offset: u32) -> Result<Vec<Conversation>> {
        let conversations: Option<Vec<Conversation>> = self
            .send_json(&api::list_conversations(limit, offset))
            .await?;
        Ok(conversations.unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.send_json(&api::get_conversation(conversation_id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<Conversation> {
        self.send_json(&api::update_conversation(conversation_id, title)?)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<Value> {
        self.send_json(&api::delete_conversation(conversation_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_all_conversations(&self) -> Result<Value> {
        self.send_json(&api::delete_all_conversations()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_messages(
        &self,
        conversation_id: &str,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let messages: Option<Vec<Message>> = self
            .send_json(&api::get_messages(conversation_id, query))
            .await?;
        Ok(messages.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, message))]
    pub async fn add_message(&self, conversation_id: &str, message: &MessageInput) -> Result<Message> {
        self.send_json(&api::add_message(conversation_id, message)?)
            .await
    }

    /// Stores a batch of messages in one request.
    #[tracing::instrument(skip(self, messages))]
    pub async fn sync_messages(
        &self,
        conversation_id: &str,
        messages: &[MessageInput],
    ) -> Result<Value> {
        self.send_json(&api::sync_messages(conversation_id, messages)?)
            .await
    }

    #[tracing::instrument(skip(self, audio))]
    pub async fn speech_to_text(
        &self,
        audio: Vec<u8>,
        file_name: Option<&str>,
    ) -> Result<SttResponse> {
        self.send_json(&api::speech_to_text(audio, file_name)).await
    }

    /// Transcribes an audio file from disk.
    #[tracing::instrument(skip(self, path))]
    pub async fn transcribe_file(&self, path: impl AsRef<Path>) -> Result<SttResponse> {
        let path = path.as_ref();
        let audio = tokio::fs::read(path).await?;
        let file_name = path.file_name().map(|name| name.to_string_lossy());
        self.speech_to_text(audio, file_name.as_deref()).await
    }

    /// Synthesizes speech and returns the audio bytes.
    #[tracing::instrument(skip(self, request))]
    pub async fn text_to_speech(&self, request: &TtsRequest) -> Result<Vec<u8>> {
        self.send(&api::text_to_speech(request)?).await?.into_bytes()
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_consolidation_status(&self) -> Result<ConsolidationStatusResponse> {
        self.send_json(&api::get_consolidation_status()).await
    }

    /// Runs consolidation and waits for the result.
    #[tracing::instrument(skip(self))]
    pub async fn run_consolidation(&self) -> Result<ConsolidationResultResponse> {
        self.send_json(&api::run_consolidation()).await
    }

    /// Starts consolidation in the background. Poll with [`MemoryClient::get_consolidation_result`].
    #[tracing::instrument(skip(self))]
    pub async fn trigger_consolidation(&self) -> Result<ConsolidationTriggerResponse> {
        self.send_json(&api::trigger_consolidation()).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_consolidation_result(
        &self,
        job_id: &str,
    ) -> Result<ConsolidationResultResponse> {
        self.send_json(&api::get_consolidation_result(job_id))
            .await
    }
}

//! # System
//!
//! Wires the engine, event bus, stores, router and generation provider
//! together and exposes the operations transports sit on top of: chat,
//! fire-and-forget execution, result lookup and event subscription.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::chat::{ChatResponse, ChatRouter};
use crate::config::{SecretConfig, SystemConfig};
use crate::event_bus::{EventBus, EventSubscription, SubscriptionId};
use crate::executor::{ExecutionId, ExecutionRecord, ExecutionStore, Executor};
use crate::provider::{
    GenerationProvider, OpenAIChatProvider, ProviderError, ProviderResult, ProviderSecret,
};
use crate::session::SessionStore;
use crate::InternalResult;

const OPENAI_PROVIDER: &str = "openai";

pub struct System {
    store: Arc<ExecutionStore>,
    event_bus: Arc<EventBus>,
    executor: Arc<Executor>,
    sessions: Arc<SessionStore>,
    provider: Arc<dyn GenerationProvider>,
    router: ChatRouter,
}

impl System {
    /// Builds a system backed by the OpenAI chat provider configured in
    /// `secret`.
    pub async fn new(config: &SystemConfig, secret: &SecretConfig) -> InternalResult<Self> {
        let provider_secret = secret
            .providers
            .get(OPENAI_PROVIDER)
            .map(ProviderSecret::from)
            .ok_or_else(|| ProviderError::SecretNotFound(OPENAI_PROVIDER.to_string()))?;
        let provider = Arc::new(OpenAIChatProvider::new(
            config.generation.clone(),
            &provider_secret,
        )?);
        Ok(Self::with_provider(config, provider).await)
    }

    /// Builds a system around an externally supplied generation provider.
    pub async fn with_provider(
        config: &SystemConfig,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        let store = Arc::new(ExecutionStore::new(config.max_execution_records));
        let event_bus = Arc::new(EventBus::new(store.clone()));
        let executor = Arc::new(
            Executor::new(config.executor.clone(), store.clone(), event_bus.clone()).await,
        );
        let sessions = Arc::new(SessionStore::new(
            config.max_sessions,
            &config.chat.target_language,
        ));
        let router = ChatRouter::new(
            &config.chat,
            executor.clone(),
            sessions.clone(),
            provider.clone(),
        );
        info!(
            provider = provider.name(),
            toolchain_available = executor.toolchain_available(),
            "system ready"
        );
        Self {
            store,
            event_bus,
            executor,
            sessions,
            provider,
            router,
        }
    }

    /// Starts an execution in the background and returns its id immediately.
    /// The result arrives through the event bus or [`System::execution_result`].
    pub fn spawn_execution(
        &self,
        code: impl Into<String>,
        input: impl Into<String>,
    ) -> ExecutionId {
        let execution_id = Uuid::new_v4().to_string();
        let executor = self.executor.clone();
        let code = code.into();
        let input = input.into();
        let id = execution_id.clone();
        tokio::spawn(async move {
            executor.execute(&code, &input, Some(id)).await;
        });
        execution_id
    }

    /// Compiles and runs `code`, waiting for the terminal record.
    pub async fn execute(&self, code: &str, input: &str) -> (ExecutionId, ExecutionRecord) {
        self.executor.execute(code, input, None).await
    }

    /// Routes one chat message for `session_id`.
    pub async fn chat(
        &self,
        message: &str,
        input_data: &str,
        session_id: &str,
    ) -> ChatResponse {
        self.router
            .process_message(message, input_data, session_id)
            .await
    }

    /// Generates code for `prompt` without touching any session.
    pub async fn generate(&self, prompt: &str, language: &str) -> ProviderResult<String> {
        self.provider.generate(prompt, language).await
    }

    pub fn execution_result(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.store.get(execution_id)
    }

    pub fn subscribe(&self, execution_id: &str) -> EventSubscription {
        self.event_bus.subscribe(execution_id)
    }

    pub fn unsubscribe(&self, execution_id: &str, subscription: SubscriptionId) {
        self.event_bus.unsubscribe(execution_id, subscription);
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    pub fn toolchain_available(&self) -> bool {
        self.executor.toolchain_available()
    }
}

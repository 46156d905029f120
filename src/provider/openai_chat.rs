//! OpenAI chat-completion backed [`GenerationProvider`].

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;

use super::llm::{strip_code_fences, GenerationProvider};
use super::types::{ProviderError, ProviderResult, ProviderSecret};
use crate::config::GenerationConfig;
use crate::session::{Role, Turn};

const GENERATE_SYSTEM_PROMPT: &str = "You are a skilled programmer who generates clean, \
     efficient code. Provide only the code without explanation unless explicitly asked for comments.";

const CLASSIFY_SYSTEM_PROMPT: &str =
    "You are a classifier that determines if a user query is asking for code generation.";

pub struct OpenAIChatProvider {
    client: Client<OpenAIConfig>,
    config: GenerationConfig,
    name: String,
}

impl OpenAIChatProvider {
    pub fn new(config: GenerationConfig, secret: &ProviderSecret) -> ProviderResult<Self> {
        if secret.api_key.expose_secret().is_empty() {
            return Err(ProviderError::Authentication(
                "API key is not set".to_string(),
            ));
        }
        let mut openai_config = OpenAIConfig::new().with_api_key(secret.api_key.expose_secret());
        if let Some(org_id) = secret.additional_auth.get("organization_id") {
            openai_config = openai_config.with_org_id(org_id.expose_secret());
        }
        Ok(Self {
            client: Client::with_config(openai_config),
            config,
            name: "openai_chat".to_string(),
        })
    }

    fn system_message(content: &str) -> ChatCompletionRequestMessage {
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(content.to_string()),
            name: None,
        })
    }

    fn user_message(content: &str) -> ChatCompletionRequestMessage {
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(content.to_string()),
            name: None,
        })
    }

    fn assistant_message(content: &str) -> ChatCompletionRequestMessage {
        ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
            content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                content.to_string(),
            )),
            ..Default::default()
        })
    }

    async fn completion(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> ProviderResult<String> {
        let request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_completion_tokens: Some(self.config.max_tokens as u32),
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    async fn classify(&self, message: &str) -> ProviderResult<bool> {
        let prompt = format!(
            "Determine if the following query is asking for a code generation task. \
             Answer 'yes' if it is, or 'no' if it is not.\nQuery: {}",
            message
        );
        let answer = self
            .completion(vec![
                Self::system_message(CLASSIFY_SYSTEM_PROMPT),
                Self::user_message(&prompt),
            ])
            .await?;
        let is_generation = answer.trim().to_lowercase() == "yes";
        debug!(is_generation, "classified message");
        Ok(is_generation)
    }

    async fn generate(&self, prompt: &str, language: &str) -> ProviderResult<String> {
        let task = format!(
            "Generate {} code for the following task.\n\n{}",
            language, prompt
        );
        let generated = self
            .completion(vec![
                Self::system_message(GENERATE_SYSTEM_PROMPT),
                Self::user_message(&task),
            ])
            .await?;
        Ok(strip_code_fences(&generated))
    }

    async fn chat(&self, history: &[Turn]) -> ProviderResult<String> {
        let messages = history
            .iter()
            .map(|turn| match turn.role {
                Role::User => Self::user_message(&turn.content),
                Role::Assistant => Self::assistant_message(&turn.content),
            })
            .collect();
        self.completion(messages).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! # Chat Router
//!
//! The conversational intent-routing state machine. Each message resolves to
//! exactly one intent, evaluated in fixed precedence:
//!
//! 1. rerun the last stored artifact (trigger phrase + stored code)
//! 2. run code supplied inline (fenced block tagged for the target language)
//! 3. generate code (classifier decides; failures fail open)
//! 4. converse
//!
//! Every message appends one user turn on entry and, on every successful
//! branch, one assistant turn on exit. Provider failures become `text`
//! responses and leave history with the user turn only. The per-session lock
//! is held for the whole turn, so concurrent messages for one session are
//! serialized in arrival order.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ChatConfig;
use crate::executor::{ExecutionId, ExecutionRecord, Executor};
use crate::provider::GenerationProvider;
use crate::session::{Role, Session, SessionStore};

/// Phrases that ask for the previously stored code to be run again.
/// Matched as case-insensitive substrings.
const RUN_TRIGGERS: &[&str] = &[
    "run it",
    "execute it",
    "run this",
    "execute this",
    "run the code",
    "execute the code",
    "run that code",
    "run the program",
    "execute the program",
];

lazy_static! {
    /// Any fenced code block with its language tag. The router filters for
    /// the target language afterwards.
    static ref CODE_BLOCK: Regex =
        Regex::new(r"```([A-Za-z0-9_+#-]*)[ \t]*\r?\n([\s\S]+?)\r?\n```")
            .expect("code block pattern");
}

/// Resolved intent of one message.
#[derive(Debug, Clone, PartialEq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    RunPrevious { code: String, language: String },
    ProvideAndRun { code: String },
    Generate,
    Converse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Text,
    CodeGeneration,
    CodeExecution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Structured response for one chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Text,
            content: content.into(),
            code: None,
            status: None,
            execution_time: None,
            execution_id: None,
            message: None,
        }
    }

    pub fn generation(code: String, message: String) -> Self {
        Self {
            kind: ResponseKind::CodeGeneration,
            content: code,
            code: None,
            status: None,
            execution_time: None,
            execution_id: None,
            message: Some(message),
        }
    }

    pub fn execution(code: String, execution_id: ExecutionId, record: &ExecutionRecord) -> Self {
        let succeeded = record.status_code == 0;
        Self {
            kind: ResponseKind::CodeExecution,
            content: if succeeded {
                record.output.clone()
            } else {
                record.error.clone()
            },
            code: Some(code),
            status: Some(if succeeded {
                RunStatus::Success
            } else {
                RunStatus::Error
            }),
            execution_time: Some(record.execution_time),
            execution_id: Some(execution_id),
            message: None,
        }
    }
}

/// Routes messages to execution, generation or conversation.
pub struct ChatRouter {
    executor: Arc<Executor>,
    sessions: Arc<SessionStore>,
    provider: Arc<dyn GenerationProvider>,
    target_language: String,
}

impl ChatRouter {
    pub fn new(
        config: &ChatConfig,
        executor: Arc<Executor>,
        sessions: Arc<SessionStore>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            executor,
            sessions,
            provider,
            target_language: config.target_language.clone(),
        }
    }

    /// Handles one message for one session. Never fails: provider and engine
    /// faults come back as `text` or `code_execution` responses.
    #[tracing::instrument(skip(self, message, input_data))]
    pub async fn process_message(
        &self,
        message: &str,
        input_data: &str,
        session_id: &str,
    ) -> ChatResponse {
        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;
        session.append_turn(Role::User, message);

        let intent = self.resolve_intent(message, &session).await;
        debug!(session_id, intent = %intent, "routing message");

        match intent {
            Intent::RunPrevious { code, language } => {
                self.run_previous(&mut session, code, language, input_data)
                    .await
            }
            Intent::ProvideAndRun { code } => {
                self.provide_and_run(&mut session, code, input_data).await
            }
            Intent::Generate => self.generate(&mut session, message).await,
            Intent::Converse => self.converse(&mut session).await,
        }
    }

    /// Precedence: rerun-stored, supply-new, then the classifier decides
    /// between generation and conversation. A classifier failure falls
    /// through to conversation.
    async fn resolve_intent(&self, message: &str, session: &Session) -> Intent {
        if is_run_request(message) {
            if let Some(code) = &session.last_generated_code {
                return Intent::RunPrevious {
                    code: code.clone(),
                    language: session.language.clone(),
                };
            }
        }
        if let Some(code) = extract_tagged_block(message, &self.target_language) {
            return Intent::ProvideAndRun { code };
        }
        match self.provider.classify(message).await {
            Ok(true) => Intent::Generate,
            Ok(false) => Intent::Converse,
            Err(e) => {
                warn!("classification failed, treating as conversation: {}", e);
                Intent::Converse
            }
        }
    }

    async fn run_previous(
        &self,
        session: &mut Session,
        code: String,
        language: String,
        input_data: &str,
    ) -> ChatResponse {
        if !self.is_supported_language(&language) {
            let content = format!(
                "Sorry, I can only execute {} code right now. The stored code is in {}.",
                self.target_language, language
            );
            session.append_turn(Role::Assistant, &content);
            return ChatResponse::text(content);
        }
        session.append_turn(Role::Assistant, "Executing previously generated code.");
        let (execution_id, record) = self.executor.execute(&code, input_data, None).await;
        ChatResponse::execution(code, execution_id, &record)
    }

    async fn provide_and_run(
        &self,
        session: &mut Session,
        code: String,
        input_data: &str,
    ) -> ChatResponse {
        // Supplying code also selects it as the session's artifact.
        session.last_generated_code = Some(code.clone());
        session.language = self.target_language.clone();
        session.append_turn(Role::Assistant, "Received code to execute.");
        let (execution_id, record) = self.executor.execute(&code, input_data, None).await;
        ChatResponse::execution(code, execution_id, &record)
    }

    async fn generate(&self, session: &mut Session, message: &str) -> ChatResponse {
        match self.provider.generate(message, &self.target_language).await {
            Ok(code) => {
                session.last_generated_code = Some(code.clone());
                session.language = self.target_language.clone();
                session.append_turn(Role::Assistant, &code);
                ChatResponse::generation(
                    code,
                    format!(
                        "Here's the generated {} code based on your request:",
                        self.target_language
                    ),
                )
            }
            Err(e) => ChatResponse::text(format!("Failed to generate code: {}", e)),
        }
    }

    async fn converse(&self, session: &mut Session) -> ChatResponse {
        match self.provider.chat(&session.history).await {
            Ok(reply) => {
                session.append_turn(Role::Assistant, &reply);
                ChatResponse::text(reply)
            }
            Err(e) => ChatResponse::text(format!("Chat error: {}", e)),
        }
    }

    fn is_supported_language(&self, language: &str) -> bool {
        language.is_empty() || language.eq_ignore_ascii_case(&self.target_language)
    }
}

fn is_run_request(message: &str) -> bool {
    let message = message.to_lowercase();
    RUN_TRIGGERS.iter().any(|trigger| message.contains(trigger))
}

/// First fenced block whose tag matches `target` (case-insensitive), trimmed.
fn extract_tagged_block(message: &str, target: &str) -> Option<String> {
    CODE_BLOCK.captures_iter(message).find_map(|captures| {
        let tag = captures.get(1)?.as_str();
        if tag.eq_ignore_ascii_case(target) {
            Some(captures.get(2)?.as_str().trim().to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_request_detection() {
        assert!(is_run_request("please run it"));
        assert!(is_run_request("RUN THE PROGRAM"));
        assert!(is_run_request("could you execute the code for me"));
        assert!(!is_run_request("what does this code do"));
        assert!(!is_run_request("running shoes"));
    }

    #[test]
    fn test_extract_tagged_block() {
        let message = "```c\nint main(){printf(\"hi\");return 0;}\n```";
        assert_eq!(
            extract_tagged_block(message, "c").unwrap(),
            "int main(){printf(\"hi\");return 0;}"
        );
    }

    #[test]
    fn test_extract_tag_is_case_insensitive() {
        let message = "here:\n```C\nint main(){return 0;}\n```";
        assert!(extract_tagged_block(message, "c").is_some());
    }

    #[test]
    fn test_extract_skips_other_languages() {
        let message = "```python\nprint('hi')\n```";
        assert!(extract_tagged_block(message, "c").is_none());

        let mixed = "```python\nprint('hi')\n```\n```c\nint main(){return 0;}\n```";
        assert_eq!(
            extract_tagged_block(mixed, "c").unwrap(),
            "int main(){return 0;}"
        );
    }

    #[test]
    fn test_extract_requires_tag() {
        let message = "```\nint main(){return 0;}\n```";
        assert!(extract_tagged_block(message, "c").is_none());
    }

    #[test]
    fn test_extract_first_of_multiple_target_blocks() {
        let message = "```c\nfirst\n```\nand\n```c\nsecond\n```";
        assert_eq!(extract_tagged_block(message, "c").unwrap(), "first");
    }

    #[test]
    fn test_execution_response_success_and_error() {
        let ok = ExecutionRecord {
            output: "hi".to_string(),
            status_code: 0,
            execution_time: 0.1,
            ..Default::default()
        };
        let response = ChatResponse::execution("code".to_string(), "id-1".to_string(), &ok);
        assert_eq!(response.kind, ResponseKind::CodeExecution);
        assert_eq!(response.content, "hi");
        assert_eq!(response.status, Some(RunStatus::Success));

        let failed = ExecutionRecord {
            error: "segfault".to_string(),
            status_code: 139,
            ..Default::default()
        };
        let response = ChatResponse::execution("code".to_string(), "id-2".to_string(), &failed);
        assert_eq!(response.content, "segfault");
        assert_eq!(response.status, Some(RunStatus::Error));
    }

    #[test]
    fn test_response_wire_shape() {
        let response = ChatResponse::text("hello");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hello");
        assert!(json.get("code").is_none());
        assert!(json.get("status").is_none());
    }
}

//! Core agent loop implementation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, LoopConfig};
use crate::llm::{GenerateOptions, LlmClient};
use crate::tools::{DispatchError, Payload, ToolKind, ToolRegistry};

use super::conversation::{Conversation, Message, Role};
use super::prompt::{build_system_prompt, PromptProfile};
use super::step::{observation_envelope, parse_step, StepError, StepKind, StepRecord};

/// Errors that end the whole session, not just the current query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("Model reply is missing required field '{0}'")]
    MissingField(&'static str),
}

/// How a single user query ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced an `output` or `result` step
    Answered(String),
    UnknownTool(String),
    UnknownStep(String),
    /// Every reply in the retry budget was invalid JSON
    MalformedReplies,
    /// The model could not be reached within the retry budget
    TransportFailed(String),
    StepLimit,
}

/// Progress reported to the caller while a query runs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Step { kind: StepKind, content: String },
    Action { tool: String, content: String },
    Observation { tool: String, output: Value },
    InvalidJson { attempt: u32, error: String },
    TransportRetry { attempt: u32, error: String },
    Warning(String),
}

/// One interactive session: an id for log correlation, the profile it was
/// opened with and the transcript.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    profile: PromptProfile,
    conversation: Conversation,
}

impl Session {
    /// A coding session opened with `instruction`.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self::with_profile(PromptProfile::Coding, instruction)
    }

    pub fn with_profile(profile: PromptProfile, instruction: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            conversation: Conversation::new(instruction),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn profile(&self) -> PromptProfile {
        self.profile
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

/// Result of asking the model for its next step, after retries.
enum Reply {
    Step(StepRecord),
    Malformed,
    TransportFailed(String),
}

/// The step-loop agent.
pub struct Agent {
    config: LoopConfig,
    options: GenerateOptions,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl Agent {
    /// Create an agent for the configured workspace.
    pub fn new(config: &Config, llm: Arc<dyn LlmClient>) -> Self {
        let options = GenerateOptions {
            max_output_tokens: config.max_output_tokens,
            temperature: Some(config.temperature),
            json_response: true,
        };
        let tools = ToolRegistry::new(config.workspace_path.clone(), config.tools.clone());
        Self::with_parts(config.agent.clone(), options, llm, tools)
    }

    pub fn with_parts(
        config: LoopConfig,
        options: GenerateOptions,
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            config,
            options,
            llm,
            tools,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start a session whose instruction follows `profile`.
    pub fn new_session(&self, profile: PromptProfile) -> Session {
        let workspace = self.tools.context().workspace().to_string_lossy().to_string();
        Session::with_profile(profile, build_system_prompt(profile, &workspace, &self.tools))
    }

    /// Run one user query to completion.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::MissingField` when the model sends a step without
    /// a required field. Every other way a query can end is a [`TurnOutcome`].
    pub async fn run_query(
        &self,
        session: &mut Session,
        query: &str,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<TurnOutcome, AgentError> {
        let span = tracing::info_span!("session", id = %session.id);
        if session.profile.is_chat() {
            self.run_chat(session, query, on_event).instrument(span).await
        } else {
            self.run_turn(session, query, on_event).instrument(span).await
        }
    }

    /// One free-text exchange: the reply is the answer, no steps or tools.
    async fn run_chat(
        &self,
        session: &mut Session,
        query: &str,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<TurnOutcome, AgentError> {
        session.conversation.append(Message::new(Role::User, query));
        let options = GenerateOptions {
            json_response: false,
            ..self.options.clone()
        };

        let mut failures = 0u32;
        let reply = loop {
            let context = session
                .conversation
                .as_context(self.config.history_char_budget);
            match self.llm.generate(&context, &options).await {
                Ok(text) => break text.trim().to_string(),
                Err(e) => {
                    failures += 1;
                    if failures > self.config.transport_retries {
                        tracing::warn!("Model call failed, giving up: {}", e);
                        return Ok(TurnOutcome::TransportFailed(e.to_string()));
                    }
                    tracing::warn!(attempt = failures, "Model call failed: {}", e);
                    on_event(AgentEvent::TransportRetry {
                        attempt: failures,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(self.backoff(failures)).await;
                }
            }
        };

        session
            .conversation
            .append(Message::new(Role::Model, reply.clone()));
        on_event(AgentEvent::Step {
            kind: StepKind::Output,
            content: reply.clone(),
        });
        Ok(TurnOutcome::Answered(reply))
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        query: &str,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<TurnOutcome, AgentError> {
        session.conversation.append(Message::new(Role::User, query));

        for step_no in 0..self.config.max_steps {
            tracing::debug!("Agent step {}", step_no + 1);

            let record = match self.next_reply(session, on_event).await? {
                Reply::Step(record) => record,
                Reply::Malformed => return Ok(TurnOutcome::MalformedReplies),
                Reply::TransportFailed(error) => return Ok(TurnOutcome::TransportFailed(error)),
            };
            session
                .conversation
                .append(Message::new(Role::Model, record.raw.clone()));

            match &record.step {
                StepKind::Action => {
                    let Some(tool) = record.function.clone() else {
                        return Err(AgentError::MissingField("function"));
                    };
                    on_event(AgentEvent::Action {
                        tool: tool.clone(),
                        content: record.content.clone(),
                    });

                    let payload = Payload::from_value(record.input.as_ref());
                    let offered = ToolKind::from_name(&tool)
                        .is_some_and(|kind| session.profile.tools().contains(&kind));
                    let dispatched = if offered {
                        self.tools.dispatch(&tool, &payload).await
                    } else {
                        Err(DispatchError::UnknownTool(tool.clone()))
                    };
                    let output = match dispatched {
                        Ok(output) => output,
                        Err(e @ DispatchError::UnknownTool(_)) => {
                            tracing::warn!("{}", e);
                            session.conversation.append(Message::new(
                                Role::ToolObservation,
                                observation_envelope(&Value::String(e.tagged())),
                            ));
                            on_event(AgentEvent::Warning(e.tagged()));
                            return Ok(TurnOutcome::UnknownTool(tool));
                        }
                    };

                    session.conversation.append(Message::new(
                        Role::ToolObservation,
                        observation_envelope(&output),
                    ));
                    on_event(AgentEvent::Observation { tool, output });
                }
                StepKind::Other(name) => {
                    tracing::warn!("Unknown step: {}", name);
                    on_event(AgentEvent::Warning(format!("Unknown step: {}", name)));
                    return Ok(TurnOutcome::UnknownStep(name.clone()));
                }
                kind if kind.is_terminal() => {
                    on_event(AgentEvent::Step {
                        kind: kind.clone(),
                        content: record.content.clone(),
                    });
                    return Ok(TurnOutcome::Answered(record.content));
                }
                kind => {
                    on_event(AgentEvent::Step {
                        kind: kind.clone(),
                        content: record.content.clone(),
                    });
                }
            }
        }

        tracing::warn!("Step limit ({}) reached", self.config.max_steps);
        Ok(TurnOutcome::StepLimit)
    }

    /// Call the model until it returns a parseable step or a retry budget runs out.
    ///
    /// The conversation is not touched here, so every retry sends the same transcript.
    async fn next_reply(
        &self,
        session: &Session,
        on_event: &mut dyn FnMut(AgentEvent),
    ) -> Result<Reply, AgentError> {
        let mut json_failures = 0u32;
        let mut transport_failures = 0u32;

        loop {
            let context = session
                .conversation
                .as_context(self.config.history_char_budget);

            let text = match self.llm.generate(&context, &self.options).await {
                Ok(text) => text,
                Err(e) => {
                    transport_failures += 1;
                    if transport_failures > self.config.transport_retries {
                        tracing::warn!("Model call failed, giving up: {}", e);
                        return Ok(Reply::TransportFailed(e.to_string()));
                    }
                    tracing::warn!(attempt = transport_failures, "Model call failed: {}", e);
                    on_event(AgentEvent::TransportRetry {
                        attempt: transport_failures,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(self.backoff(transport_failures)).await;
                    continue;
                }
            };

            match parse_step(&text) {
                Ok(record) => return Ok(Reply::Step(record)),
                Err(StepError::MissingField(field)) => return Err(AgentError::MissingField(field)),
                Err(StepError::Malformed(error)) => {
                    json_failures += 1;
                    tracing::warn!(attempt = json_failures, "Invalid JSON from model: {}", error);
                    on_event(AgentEvent::InvalidJson {
                        attempt: json_failures,
                        error,
                    });
                    if json_failures > self.config.json_retries {
                        return Ok(Reply::Malformed);
                    }
                    tokio::time::sleep(self.backoff(json_failures)).await;
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(10);
        self.config.retry_backoff.saturating_mul(factor)
    }
}

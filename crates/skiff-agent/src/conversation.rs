//! The conversation loop.
//!
//! [`Conversation::send`] appends the user message, streams the model's
//! reply, runs any tool calls in emission order, appends their results and
//! asks again, until the model stops calling tools or the iteration cap is
//! reached. Every message goes through the [`SessionStore`], so a crash
//! mid-turn leaves a resumable transcript.

use std::sync::Arc;

use skiff_config::SkiffConfig;
use skiff_llm::{
    ContentBlock, ConverseRequest, LlmError, Message, StopReason, StreamEvent, StreamingClient,
    ToolResultContent, ToolUseContent,
};
use skiff_session::{Context, Session, SessionStore};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::tool::{ToolContext, ToolRegistry, ToolResult};

/// Base instructions sent with every turn.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an assistant embedded in a terminal AWS resource browser. \
Answer questions about the operator's cloud resources using the tools provided. \
The tools are read-only: never claim to have changed, created or deleted anything. \
Query live data rather than guessing, keep answers short, and cite resource ids.";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-conversation model and loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Requested reasoning budget; dropped for models without support.
    pub thinking_budget: Option<u32>,
    /// Model turns allowed per user message.
    pub max_iterations: u32,
    pub system_prompt: String,
}

impl ConversationConfig {
    /// Create a config for the given model with default limits.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: skiff_config::DEFAULT_MAX_TOKENS,
            temperature: None,
            thinking_budget: None,
            max_iterations: skiff_config::DEFAULT_MAX_ITERATIONS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(config: &SkiffConfig) -> Self {
        Self {
            model: config.model().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            thinking_budget: config.thinking_budget(),
            max_iterations: config.max_iterations(),
            system_prompt: config
                .system_prompt()
                .unwrap_or(DEFAULT_SYSTEM_PROMPT)
                .to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events and Response
// ─────────────────────────────────────────────────────────────────────────────

/// Progress reported while a message is being answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// Assistant text delta.
    Text { content: String },
    /// Reasoning delta.
    Thinking { content: String },
    /// A tool is about to run.
    ToolStart { id: String, name: String },
    /// A tool finished.
    ToolEnd {
        id: String,
        success: bool,
        content: String,
    },
    /// The answer is complete.
    Done { iterations: u32, truncated: bool },
}

/// Outcome of [`Conversation::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationResponse {
    /// Text of the final model turn.
    pub text: String,
    /// Tool calls answered across all iterations.
    pub tool_calls: usize,
    /// Model turns used.
    pub iterations: u32,
    pub stop_reason: StopReason,
    /// The iteration cap cut the loop short.
    pub truncated: bool,
}

/// One decoded model turn.
struct TurnOutput {
    blocks: Vec<ContentBlock>,
    stop_reason: StopReason,
}

impl TurnOutput {
    fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect()
    }

    fn tool_uses(&self) -> Vec<ToolUseContent> {
        self.blocks
            .iter()
            .filter_map(ContentBlock::as_tool_use)
            .cloned()
            .collect()
    }
}

fn from_llm(err: LlmError) -> AgentError {
    if err.is_cancelled() {
        AgentError::Cancelled
    } else {
        AgentError::Llm(err)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// One session's conversation with the model.
pub struct Conversation {
    client: StreamingClient,
    tools: Arc<ToolRegistry>,
    store: SessionStore,
    session: Session,
    config: ConversationConfig,
}

impl Conversation {
    /// Wrap an existing session.
    pub fn new(
        client: StreamingClient,
        tools: Arc<ToolRegistry>,
        store: SessionStore,
        config: ConversationConfig,
        session: Session,
    ) -> Self {
        Self {
            client,
            tools,
            store,
            session,
            config,
        }
    }

    /// Start a fresh session with the given view context.
    pub fn start(
        client: StreamingClient,
        tools: Arc<ToolRegistry>,
        store: SessionStore,
        config: ConversationConfig,
        context: Option<Context>,
    ) -> Self {
        let session = store.create(context);
        Self::new(client, tools, store, config, session)
    }

    /// Resume a stored session by id.
    pub fn resume(
        client: StreamingClient,
        tools: Arc<ToolRegistry>,
        store: SessionStore,
        config: ConversationConfig,
        id: &str,
    ) -> Result<Self> {
        let session = store.load(id)?;
        tracing::info!(session_id = %session.id, messages = session.message_count(), "Resumed session");
        Ok(Self::new(client, tools, store, config, session))
    }

    /// Resume the current session, or start one with `context` if there is
    /// none.
    pub fn resume_or_start(
        client: StreamingClient,
        tools: Arc<ToolRegistry>,
        store: SessionStore,
        config: ConversationConfig,
        context: Option<Context>,
    ) -> Result<Self> {
        match store.load_current()? {
            Some(session) => Ok(Self::new(client, tools, store, config, session)),
            None => Ok(Self::start(client, tools, store, config, context)),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Base prompt plus a description of the session's view context.
    pub fn system_prompt(&self) -> String {
        match &self.session.context {
            Some(context) => format!(
                "{}\n\n## Current view\n{}",
                self.config.system_prompt,
                context.describe()
            ),
            None => self.config.system_prompt.clone(),
        }
    }

    fn build_request(&self) -> ConverseRequest {
        let mut request = ConverseRequest::new(
            &self.config.model,
            self.session.messages.clone(),
            self.config.max_tokens,
        )
        .with_system(self.system_prompt())
        .with_tools(self.tools.to_llm_definitions());

        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(budget) = self.config.thinking_budget {
            request = request.with_thinking_budget(budget);
        }
        request
    }

    /// Answer one user message.
    ///
    /// `on_event` sees text as it streams and each tool call as it runs.
    /// Transport errors and cancellation end the call with `Err`; whatever
    /// was appended before that stays in the session.
    pub async fn send<F>(
        &mut self,
        text: &str,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<ConversationResponse>
    where
        F: FnMut(ConversationEvent),
    {
        tracing::info!(
            session_id = %self.session.id,
            message_len = text.len(),
            "Turn started"
        );
        self.store.append(&mut self.session, Message::user(text));

        let ctx = ToolContext::with_cancellation(self.session.id.clone(), cancel.clone());
        let mut tool_calls = 0;
        let mut iterations = 0;

        loop {
            iterations += 1;
            let request = self.build_request();
            tracing::debug!(
                session_id = %self.session.id,
                iteration = iterations,
                messages = request.messages.len(),
                model = %request.model,
                "Requesting model turn"
            );

            let turn = self.stream_turn(&request, &cancel, &mut on_event).await?;
            let tool_uses = turn.tool_uses();
            let text = turn.text();

            tracing::debug!(
                session_id = %self.session.id,
                iteration = iterations,
                stop_reason = ?turn.stop_reason,
                tool_uses = tool_uses.len(),
                "Model turn complete"
            );

            if !turn.blocks.is_empty() {
                self.store
                    .append(&mut self.session, Message::assistant_blocks(turn.blocks));
            }

            // Every tool use must be answered, even after a max_tokens stop
            if tool_uses.is_empty() {
                on_event(ConversationEvent::Done {
                    iterations,
                    truncated: false,
                });
                return Ok(ConversationResponse {
                    text,
                    tool_calls,
                    iterations,
                    stop_reason: turn.stop_reason,
                    truncated: false,
                });
            }

            let results = self.run_tools(&tool_uses, &ctx, &mut on_event).await;
            tool_calls += results.len();
            self.store
                .append(&mut self.session, Message::tool_results(results));

            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            if iterations >= self.config.max_iterations {
                tracing::warn!(
                    session_id = %self.session.id,
                    iterations,
                    "Max iterations reached, stopping tool loop"
                );
                on_event(ConversationEvent::Done {
                    iterations,
                    truncated: true,
                });
                return Ok(ConversationResponse {
                    text,
                    tool_calls,
                    iterations,
                    stop_reason: turn.stop_reason,
                    truncated: true,
                });
            }
        }
    }

    async fn stream_turn<F>(
        &self,
        request: &ConverseRequest,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Result<TurnOutput>
    where
        F: FnMut(ConversationEvent),
    {
        let mut stream = self
            .client
            .converse(request, cancel.clone())
            .await
            .map_err(from_llm)?;

        let mut blocks = Vec::new();
        let mut pending_text = String::new();
        let flush = |pending: &mut String, blocks: &mut Vec<ContentBlock>| {
            if !pending.is_empty() {
                blocks.push(ContentBlock::text(std::mem::take(pending)));
            }
        };

        while let Some(event) = stream.next_event().await {
            match event {
                StreamEvent::Text(delta) => {
                    pending_text.push_str(&delta);
                    on_event(ConversationEvent::Text { content: delta });
                }
                StreamEvent::Thinking(delta) => {
                    on_event(ConversationEvent::Thinking { content: delta });
                }
                StreamEvent::ThinkingComplete { text, signature } => {
                    flush(&mut pending_text, &mut blocks);
                    blocks.push(ContentBlock::reasoning(text, signature));
                }
                StreamEvent::ToolUse(tool_use) => {
                    flush(&mut pending_text, &mut blocks);
                    blocks.push(ContentBlock::ToolUse(tool_use));
                }
                StreamEvent::Done(stop_reason) => {
                    flush(&mut pending_text, &mut blocks);
                    return Ok(TurnOutput {
                        blocks,
                        stop_reason,
                    });
                }
                StreamEvent::Error(e) => {
                    tracing::warn!(session_id = %self.session.id, error = %e, "Model turn failed");
                    return Err(from_llm(e));
                }
            }
        }

        Err(AgentError::Llm(LlmError::Decode(
            "event stream closed without a terminal event".to_string(),
        )))
    }

    /// Run tool uses one at a time, in order. Once cancelled, the rest are
    /// answered without running.
    async fn run_tools<F>(
        &self,
        tool_uses: &[ToolUseContent],
        ctx: &ToolContext,
        on_event: &mut F,
    ) -> Vec<ToolResultContent>
    where
        F: FnMut(ConversationEvent),
    {
        tracing::info!(
            session_id = %self.session.id,
            tool_count = tool_uses.len(),
            tools = %tool_uses.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
            "Executing tools"
        );

        let mut results = Vec::with_capacity(tool_uses.len());
        for tool_use in tool_uses {
            let result = if ctx.is_cancelled() {
                ToolResult::error("Cancelled before execution").into_content(&tool_use.id)
            } else {
                on_event(ConversationEvent::ToolStart {
                    id: tool_use.id.clone(),
                    name: tool_use.name.clone(),
                });
                let result = self.tools.dispatch(tool_use, ctx).await;
                on_event(ConversationEvent::ToolEnd {
                    id: tool_use.id.clone(),
                    success: !result.is_error,
                    content: result.content.clone(),
                });
                result
            };
            results.push(result);
        }
        results
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("session_id", &self.session.id)
            .field("messages", &self.session.message_count())
            .field("tools", &self.tools.names())
            .field("config", &self.config)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

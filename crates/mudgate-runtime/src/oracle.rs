//! Decision oracles – the LLM side of the session.
//!
//! An [`Oracle`] maps `(system instructions, user context)` to one proposed
//! game command.  Two HTTP drivers are provided:
//!
//! - [`AnthropicOracle`] – Anthropic Messages API (`/v1/messages`).
//! - [`OpenAiCompatOracle`] – any OpenAI-compatible `/v1/chat/completions`
//!   endpoint, such as [Ollama](https://ollama.com) (`http://localhost:11434`)
//!   or OpenAI itself.
//!
//! [`STABILITY_GUIDELINES`] are appended to every system prompt so the model
//! is told not to repeat itself before the loop detector has to step in.
//!
//! Oracle calls are unreliable by nature.  [`propose_with_retry`] wraps any
//! oracle in a bounded retry with fixed backoff and turns exhaustion into
//! "no command this cycle" instead of an error.  Every billed attempt is
//! recorded in the caller's [`UsageMeter`], including ones whose reply was
//! unusable.
//!
//! # Example
//!
//! ```rust,no_run
//! use mudgate_runtime::oracle::{OpenAiCompatOracle, Oracle};
//!
//! # async fn run() {
//! let oracle = OpenAiCompatOracle::new("http://localhost:11434", "llama3", None);
//! // Requires a running Ollama instance.
//! let proposal = oracle.propose("You play a MUD.", "You are in a clearing.").await;
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Default Anthropic API root.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-opus-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Commands are short; a small budget keeps the model from explaining itself.
pub const MAX_TOKENS: u32 = 100;
pub const TEMPERATURE: f32 = 0.7;

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

/// Anti-loop rules appended to every system prompt.
pub const STABILITY_GUIDELINES: &str = "\
## Stability Guidelines (anti-loop rules)
- Do not send the same command more than 3 times in a row.
- If a command fails or the game says you cannot do it, try something else.
- If the exits do not include a direction, do not try to walk that way.
- When stuck, look around, check your score, or peer in an unexplored direction.";

/// Build the standing instructions for a BatMUD session.
///
/// When `password` is `None` the login paragraph is omitted and the oracle is
/// expected to play as a guest or an already-logged-in character.
pub fn system_prompt(name_prefix: &str, password: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are playing BatMUD, a text-based multiplayer game.\n\
         Based on the current game state, decide what action to take next.\n",
    );
    if let Some(password) = password {
        prompt.push_str(&format!(
            "If the game asks to create a character, respond with \"create character\". \
             Set the name to \"{name_prefix}\" followed by a random string of four letters.\n\
             If the game asks for a password, respond with \"{password}\".\n"
        ));
    }
    prompt.push_str(
        "Explore the world. If you are confronted with a monster, kill it.\n\
         Respond with only the command to execute, no explanation.",
    );
    prompt
}

fn with_guidelines(system: &str) -> String {
    if system.is_empty() {
        STABILITY_GUIDELINES.to_string()
    } else {
        format!("{system}\n\n{STABILITY_GUIDELINES}")
    }
}

/// Reduce a model reply to a single sendable command.
///
/// Takes the first non-blank line and strips code fences, quotes, and a
/// leading `>` prompt marker.
pub fn sanitize_command(reply: &str) -> String {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("```"))
        .unwrap_or("");
    line.trim_start_matches('>')
        .trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Core types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from oracle calls.
#[derive(Error, Debug)]
pub enum OracleError {
    /// The HTTP request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response could not be understood.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
    /// The model answered, but with nothing sendable.  Carries what the
    /// answer cost.
    #[error("empty proposal")]
    Empty(Usage),
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One proposed command plus what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub command: String,
    pub usage: Usage,
}

/// A decision service that proposes the next game command.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask for one command given standing instructions and the current
    /// context.
    async fn propose(&self, system: &str, user_context: &str) -> Result<Proposal, OracleError>;

    /// Short label for logs, e.g. `"anthropic:claude-3-opus"`.
    fn describe(&self) -> String;
}

/// Running totals of oracle usage for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageMeter {
    pub calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageMeter {
    pub fn record(&mut self, usage: Usage) {
        self.calls += 1;
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Bounded retry with fixed backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Call `oracle` up to `policy.attempts` times.
///
/// Request errors and empty proposals are retried after `policy.backoff`.
/// Every attempt that got an answer is recorded in `meter`.  Returns `None`
/// when every attempt failed; this is never fatal.
pub async fn propose_with_retry(
    oracle: &dyn Oracle,
    policy: &RetryPolicy,
    system: &str,
    user_context: &str,
    meter: &mut UsageMeter,
) -> Option<Proposal> {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match oracle.propose(system, user_context).await {
            Ok(proposal) if !proposal.command.trim().is_empty() => {
                meter.record(proposal.usage);
                debug!(attempt, command = %proposal.command, "oracle proposal received");
                return Some(proposal);
            }
            Ok(proposal) => {
                meter.record(proposal.usage);
                warn!(attempt, oracle = %oracle.describe(), "oracle returned an empty proposal");
            }
            Err(OracleError::Empty(usage)) => {
                meter.record(usage);
                warn!(attempt, oracle = %oracle.describe(), "oracle returned an empty proposal");
            }
            Err(e) => warn!(attempt, oracle = %oracle.describe(), error = %e, "oracle call failed"),
        }
        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }
    warn!(attempts, "oracle retries exhausted; no command this cycle");
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Messages API
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [AnthropicMessage<'a>; 1],
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Oracle backed by the Anthropic Messages API.
pub struct AnthropicOracle {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicOracle {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn parse(response: AnthropicResponse) -> Result<Proposal, OracleError> {
        let text = response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| OracleError::BadResponse("no text block in content".into()))?;
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();
        let command = sanitize_command(&text);
        if command.is_empty() {
            return Err(OracleError::Empty(usage));
        }
        Ok(Proposal { command, usage })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn propose(&self, system: &str, user_context: &str) -> Result<Proposal, OracleError> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let system = with_guidelines(system);
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: &system,
            messages: [AnthropicMessage {
                role: "user",
                content: user_context,
            }],
        };

        let response: AnthropicResponse = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse(response)
    }

    fn describe(&self) -> String {
        format!("anthropic:{}", self.model)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible chat completions
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Oracle backed by an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatOracle {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatOracle {
    /// `api_key` is optional; local Ollama servers do not need one.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn messages(system: &str, user_context: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: with_guidelines(system),
            },
            ChatMessage {
                role: Role::User,
                content: user_context.to_string(),
            },
        ]
    }

    fn parse(response: ChatResponse) -> Result<Proposal, OracleError> {
        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleError::BadResponse("empty choices array".into()))?;
        let usage = response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let command = sanitize_command(&text);
        if command.is_empty() {
            return Err(OracleError::Empty(usage));
        }
        Ok(Proposal { command, usage })
    }
}

#[async_trait]
impl Oracle for OpenAiCompatOracle {
    async fn propose(&self, system: &str, user_context: &str) -> Result<Proposal, OracleError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let messages = Self::messages(system, user_context);
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response: ChatResponse = request.send().await?.error_for_status()?.json().await?;

        Self::parse(response)
    }

    fn describe(&self) -> String {
        format!("openai-compat:{}", self.model)
    }
}

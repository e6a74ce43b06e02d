//! Shared test doubles for crewlaunch integration tests.
//!
//! - [`ScriptedLlm`] replays queued replies and records every request.
//! - [`FailingLlm`] fails every call.
//! - [`RecordingSurface`] captures everything a log adapter renders.
//! - [`StaticTool`] and [`FailingTool`] stand in for real tools.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crewlaunch_core::adapter::UiSurface;
use crewlaunch_core::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use crewlaunch_core::tools::Tool;

// ---------------------------------------------------------------------------
// LLM doubles
// ---------------------------------------------------------------------------

/// LLM client that answers from a fixed script, in order.
///
/// Once the script is exhausted every call fails with
/// [`LlmError::InvalidResponse`].
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }

    /// Content of the last message of request `index`.
    pub fn last_message(&self, index: usize) -> String {
        self.requests()
            .get(index)
            .and_then(|r| r.messages.last())
            .map(|m| m.content.clone())
            .unwrap_or_else(|| panic!("no request at index {index}"))
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("replies lock poisoned").len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request);
        let reply = self
            .replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))?;
        Ok(CompletionResponse {
            content: reply,
            usage: None,
        })
    }
}

/// LLM client whose every call fails with an API error.
pub struct FailingLlm {
    pub status: u16,
    pub message: String,
}

impl FailingLlm {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmClient for FailingLlm {
    fn model(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::Api {
            status: self.status,
            message: self.message.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// UI surface
// ---------------------------------------------------------------------------

/// Surface that records each rendered block and toast.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub blocks: Vec<String>,
    pub toasts: Vec<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rendered blocks joined, as the UI would show them.
    pub fn rendered(&self) -> String {
        self.blocks.concat()
    }
}

impl UiSurface for RecordingSurface {
    fn render(&mut self, block: &str) {
        self.blocks.push(block.to_string());
    }

    fn toast(&mut self, message: &str) {
        self.toasts.push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// Tool that always returns the same text and records its inputs.
pub struct StaticTool {
    name: String,
    output: String,
    inputs: Mutex<Vec<String>>,
}

impl StaticTool {
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().expect("inputs lock poisoned").clone()
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns canned text."
    }

    async fn run(&self, input: &str) -> String {
        self.inputs
            .lock()
            .expect("inputs lock poisoned")
            .push(input.to_string());
        self.output.clone()
    }
}

/// Tool that reports a failure as its text result, like the real tools do.
pub struct FailingTool {
    name: String,
    error: String,
}

impl FailingTool {
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    async fn run(&self, _input: &str) -> String {
        format!("Error performing search: {}", self.error)
    }
}

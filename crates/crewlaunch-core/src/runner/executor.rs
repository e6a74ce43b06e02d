//! Single-agent ReAct loop.
//!
//! The model alternates `Thought:` / `Action:` / `Action Input:` lines with
//! observations fed back by the executor until it emits `Final Answer:`.
//! Generation stops at [`STOP_SEQUENCE`] so the model never invents its own
//! observations.

use std::sync::OnceLock;

use regex::Regex;

use crate::crew::Agent;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError};
use crate::tools::Tool;
use crate::trace::TraceSink;

/// Stop sequence sent with every completion request.
pub const STOP_SEQUENCE: &str = "\nObservation:";

/// Appended once an agent has used up `max_iter` iterations.
pub const FORCE_FINAL_ANSWER: &str = "Now it's time you MUST give your absolute best final \
     answer. You'll ignore all previous instructions, stop using any tools, and just return \
     your absolute BEST Final answer.";

const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The agent is done.
    FinalAnswer(String),
    /// The agent wants to call `tool` with `input`.
    Action { tool: String, input: String },
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action\s*\d*\s*:\s*([^\n]*?)\s*\n\s*Action\s*\d*\s*Input\s*\d*\s*:\s*(.*)")
            .expect("valid action regex")
    })
}

/// Parse one model response.
///
/// A `Final Answer:` wins over an action in the same response. Text with
/// neither is taken as the final answer as-is.
pub fn parse_step(text: &str) -> Step {
    if let Some(pos) = text.find(FINAL_ANSWER_MARKER) {
        let answer = text[pos + FINAL_ANSWER_MARKER.len()..].trim();
        return Step::FinalAnswer(answer.to_string());
    }

    if let Some(caps) = action_re().captures(text) {
        let tool = caps[1].trim().trim_matches('*').trim().to_string();
        // Drop anything past a hallucinated observation.
        let raw_input = caps[2].split(STOP_SEQUENCE.trim_start()).next().unwrap_or("");
        let input = raw_input.trim().trim_matches('"').trim().to_string();
        if !tool.is_empty() {
            return Step::Action { tool, input };
        }
    }

    Step::FinalAnswer(text.trim().to_string())
}

/// System prompt describing the agent and its tool protocol.
pub fn system_prompt(agent: &Agent, tools: &[&dyn Tool]) -> String {
    let mut prompt = format!(
        "You are {}.\n{}\n\nYour personal goal is: {}",
        agent.role, agent.backstory, agent.goal
    );

    if tools.is_empty() {
        prompt.push_str(
            "\n\nTo give my best complete final answer to the task use the exact following \
             format:\n\nThought: I now can give a great answer\nFinal Answer: Your final \
             answer must be the great and the most complete as possible, it must be outcome \
             described.\n\nI MUST use these formats, my job depends on it!",
        );
        return prompt;
    }

    let listing: Vec<String> = tools
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect();
    let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();

    prompt.push_str(&format!(
        "\n\nYou ONLY have access to the following tools, and should NEVER make up tools \
         that are not listed here:\n\n{}\n\nUse the following format:\n\nThought: you should \
         always think about what to do\nAction: the action to take, only one name of [{}], \
         just the name, exactly as it's written.\nAction Input: the input to the action, \
         just a simple text\nObservation: the result of the action\n\nOnce all necessary \
         information is gathered:\n\nThought: I now know the final answer\nFinal Answer: the \
         final answer to the original input question",
        listing.join("\n"),
        names.join(", ")
    ));
    prompt
}

/// User prompt for one task, with optional context and memory sections.
pub fn task_prompt(
    description: &str,
    expected_output: &str,
    context: Option<&str>,
    memory: Option<&str>,
) -> String {
    let mut prompt = format!(
        "\nCurrent Task: {description}\n\nThis is the expected criteria for your final answer: \
         {expected_output}\nyou MUST return the actual complete content as the final answer, \
         not a summary."
    );
    if let Some(context) = context.filter(|c| !c.is_empty()) {
        prompt.push_str(&format!(
            "\n\nThis is the context you're working with:\n{context}"
        ));
    }
    if let Some(memory) = memory.filter(|m| !m.is_empty()) {
        prompt.push_str(&format!("\n\n# Useful context from memory:\n{memory}"));
    }
    prompt.push_str(
        "\n\nBegin! This is VERY important to you, use the tools available and give your \
         best Final Answer, your job depends on it!\n\nThought:",
    );
    prompt
}

/// Runs one agent on one task.
pub struct AgentExecutor<'a> {
    llm: &'a dyn LlmClient,
    agent: &'a Agent,
    tools: Vec<&'a dyn Tool>,
}

impl<'a> AgentExecutor<'a> {
    pub fn new(llm: &'a dyn LlmClient, agent: &'a Agent, tools: Vec<&'a dyn Tool>) -> Self {
        Self { llm, agent, tools }
    }

    /// Drive the loop to a final answer, echoing each turn into `trace`.
    pub async fn execute(
        &self,
        user_prompt: String,
        trace: &mut dyn TraceSink,
    ) -> Result<String, LlmError> {
        let mut messages = vec![
            ChatMessage::system(system_prompt(self.agent, &self.tools)),
            ChatMessage::user(user_prompt),
        ];
        let mut iterations = 0usize;

        loop {
            if iterations >= self.agent.max_iter {
                tracing::info!(agent = %self.agent.role, iterations, "forcing final answer");
                messages.push(ChatMessage::user(FORCE_FINAL_ANSWER));
                let content = self.complete(&messages).await?;
                trace.write_chunk(&format!("{}\n", content.trim_end()));
                return Ok(match parse_step(&content) {
                    Step::FinalAnswer(answer) => answer,
                    Step::Action { .. } => content.trim().to_string(),
                });
            }

            let content = self.complete(&messages).await?;
            iterations += 1;
            trace.write_chunk(&format!("{}\n", content.trim_end()));

            match parse_step(&content) {
                Step::FinalAnswer(answer) => return Ok(answer),
                Step::Action { tool, input } => {
                    let observation = self.use_tool(&tool, &input).await;
                    trace.write_chunk(&format!("\nObservation: {observation}\n"));
                    messages.push(ChatMessage::assistant(content.trim_end()));
                    messages.push(ChatMessage::user(format!("Observation: {observation}")));
                }
            }
        }
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages: messages.to_vec(),
            stop: vec![STOP_SEQUENCE.to_string()],
        };
        Ok(self.llm.complete(request).await?.content)
    }

    async fn use_tool(&self, name: &str, input: &str) -> String {
        match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => {
                tracing::debug!(agent = %self.agent.role, tool = name, input, "running tool");
                tool.run(input).await
            }
            None => {
                tracing::warn!(agent = %self.agent.role, tool = name, "agent requested unknown tool");
                if self.tools.is_empty() {
                    format!("Tool '{name}' does not exist. No tools are available, give your Final Answer.")
                } else {
                    let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
                    format!(
                        "Tool '{name}' does not exist. Available tools: {}",
                        names.join(", ")
                    )
                }
            }
        }
    }
}

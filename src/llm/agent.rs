//! Reasoning loop: a bounded ReAct state machine over the capability registry
//!
//! States: THINKING -> {ACTING, ANSWERING} -> THINKING | DONE | STOPPED.
//! Every recoverable failure (unknown capability, validation rejection,
//! capability execution failure, unparseable model output) becomes an
//! observation on the trace so the next thinking step can self-correct.
//! Only a backend failure that survives its retry budget aborts the request.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::backend::{complete_with_retry, BackendError, ChatBackend};
use super::react::{self, Directive};
use crate::prompts;
use crate::tools::ToolRegistry;

/// One reasoning step: an optional thought, the action taken (if any), and
/// what came back.
#[derive(Debug, Clone)]
pub struct ReasoningStep {
    pub thought: Option<String>,
    pub action: Option<ActionRecord>,
    pub observation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub tool: String,
    pub input: String,
}

/// Ordered history of reasoning steps for one request. Owned exclusively by
/// that request's execution; never longer than the configured step budget.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    steps: Vec<ReasoningStep>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: ReasoningStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn last_observation(&self) -> Option<&str> {
        self.steps
            .iter()
            .rev()
            .find_map(|s| s.observation.as_deref())
    }
}

/// Terminal result of one request.
#[derive(Debug)]
pub struct AgentOutcome {
    pub answer: String,
    pub trace: Trace,
    /// True when the step budget ran out and the answer was synthesized
    /// from the trace rather than reached naturally.
    pub stopped_early: bool,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),
}

enum State {
    Thinking,
    Acting {
        thought: Option<String>,
        action: String,
        input: String,
    },
    Answering {
        text: String,
    },
}

/// The reasoning loop, generic over its backend.
pub struct ReasonAgent {
    backend: Arc<dyn ChatBackend>,
    tools: Arc<ToolRegistry>,
    max_steps: usize,
    max_retries: u32,
}

impl ReasonAgent {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tools: Arc<ToolRegistry>,
        max_steps: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            backend,
            tools,
            max_steps,
            max_retries,
        }
    }

    /// Resolve one request to a final answer.
    pub async fn run(&self, question: &str) -> Result<AgentOutcome, AgentError> {
        let mut trace = Trace::new();
        let mut state = State::Thinking;

        loop {
            match state {
                State::Thinking => {
                    if trace.len() >= self.max_steps {
                        info!(steps = trace.len(), "step budget exhausted, stopping early");
                        return Ok(self.stop_early(question, trace).await);
                    }

                    let prompt = prompts::render_react(question, &self.tools, &trace);
                    let output = complete_with_retry(
                        self.backend.as_ref(),
                        prompts::AGENT_SYSTEM,
                        &prompt,
                        self.max_retries,
                    )
                    .await?;

                    state = match react::parse(&output) {
                        Ok(Directive::Act {
                            thought,
                            action,
                            input,
                        }) => State::Acting {
                            thought,
                            action,
                            input,
                        },
                        Ok(Directive::Answer { text, .. }) => State::Answering { text },
                        Err(e) => {
                            debug!(error = %e, "unparseable model output");
                            trace.push(ReasoningStep {
                                thought: None,
                                action: None,
                                observation: Some(format!(
                                    "Your last reply could not be interpreted ({e}). Reply \
                                     with either an Action/Action Input pair or a Final Answer, \
                                     exactly as the format prescribes."
                                )),
                            });
                            State::Thinking
                        }
                    };
                }

                State::Acting {
                    thought,
                    action,
                    input,
                } => {
                    let observation = self.perform(&action, &input).await;
                    debug!(%action, %input, "capability observation recorded");
                    trace.push(ReasoningStep {
                        thought,
                        action: Some(ActionRecord {
                            tool: action,
                            input,
                        }),
                        observation: Some(observation),
                    });
                    state = State::Thinking;
                }

                State::Answering { text } => {
                    info!(steps = trace.len(), "final answer reached");
                    return Ok(AgentOutcome {
                        answer: text,
                        trace,
                        stopped_early: false,
                    });
                }
            }
        }
    }

    /// Run one capability and fold every recoverable failure into the
    /// observation string.
    async fn perform(&self, action: &str, input: &str) -> String {
        let Some(tool) = self.tools.get(action) else {
            return format!(
                "Unknown capability {action:?}. Available capabilities: {}",
                self.tools.names().join(", ")
            );
        };
        let validated = match self.tools.validate_input(tool, input) {
            Ok(validated) => validated,
            Err(e) => return e.to_string(),
        };
        match tool.invoke(validated).await {
            Ok(observation) => observation,
            Err(e) => e.to_string(),
        }
    }

    /// Budget exhausted: synthesize a best-effort answer from the trace.
    /// This is a normal terminal state; it always produces an answer.
    async fn stop_early(&self, question: &str, trace: Trace) -> AgentOutcome {
        let prompt = prompts::render_synthesis(question, &trace);
        let answer = match complete_with_retry(
            self.backend.as_ref(),
            prompts::SYNTHESIZE_SYSTEM,
            &prompt,
            self.max_retries,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "synthesis call failed, falling back to trace summary");
                match trace.last_observation() {
                    Some(observation) => format!(
                        "Stopped after {} steps without a final answer. \
                         Last observation: {observation}",
                        trace.len()
                    ),
                    None => format!(
                        "Stopped after {} steps without gathering any observations.",
                        trace.len()
                    ),
                }
            }
        };
        AgentOutcome {
            answer,
            trace,
            stopped_early: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::backend::testing::ScriptedBackend;
    use super::*;
    use crate::tools::testing::{StaticTool, IPV4_FIELD, TEXT_FIELD};
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(StaticTool {
            tool_name: "echo",
            spec: TEXT_FIELD,
            response: Ok("echo: "),
        }));
        registry.register(Arc::new(StaticTool {
            tool_name: "lookup",
            spec: IPV4_FIELD,
            response: Ok("resolved "),
        }));
        registry.register(Arc::new(StaticTool {
            tool_name: "broken",
            spec: TEXT_FIELD,
            response: Err("downstream service unavailable"),
        }));
        Arc::new(registry)
    }

    fn agent(replies: Vec<Result<&str, &str>>, max_steps: usize) -> ReasonAgent {
        ReasonAgent::new(
            Arc::new(ScriptedBackend::new("scripted", replies)),
            registry(),
            max_steps,
            0,
        )
    }

    #[tokio::test]
    async fn immediate_final_answer() {
        let agent = agent(
            vec![Ok("Thought: Do I need to use a tool? No\nFinal Answer: 42")],
            5,
        );
        let outcome = agent.run("what is the answer?").await.unwrap();
        assert_eq!(outcome.answer, "42");
        assert!(outcome.trace.is_empty());
        assert!(!outcome.stopped_early);
    }

    #[tokio::test]
    async fn act_then_answer_records_observation() {
        let agent = agent(
            vec![
                Ok("Thought: need the tool\nAction: echo\nAction Input: hello"),
                Ok("Final Answer: it said echo: hello"),
            ],
            5,
        );
        let outcome = agent.run("try the echo tool").await.unwrap();
        assert_eq!(outcome.trace.len(), 1);
        let step = &outcome.trace.steps()[0];
        assert_eq!(step.action.as_ref().unwrap().tool, "echo");
        assert_eq!(step.observation.as_deref(), Some("echo: hello"));
        assert_eq!(outcome.answer, "it said echo: hello");
    }

    #[tokio::test]
    async fn unknown_capability_is_recoverable() {
        let agent = agent(
            vec![
                Ok("Action: nonexistent\nAction Input: x"),
                Ok("Final Answer: recovered"),
            ],
            5,
        );
        let outcome = agent.run("q").await.unwrap();
        let observation = outcome.trace.steps()[0].observation.as_deref().unwrap();
        assert!(observation.contains("Unknown capability"));
        assert!(observation.contains("echo"));
        assert_eq!(outcome.answer, "recovered");
    }

    #[tokio::test]
    async fn validation_failure_becomes_observation() {
        let agent = agent(
            vec![
                Ok("Action: lookup\nAction Input: 203.0.113.5/24"),
                Ok("Final Answer: done"),
            ],
            5,
        );
        let outcome = agent.run("q").await.unwrap();
        let observation = outcome.trace.steps()[0].observation.as_deref().unwrap();
        assert!(observation.contains("CIDR"));
        assert!(!outcome.stopped_early);
    }

    #[tokio::test]
    async fn capability_failure_does_not_abort_the_loop() {
        let agent = agent(
            vec![
                Ok("Action: broken\nAction Input: anything"),
                Ok("Final Answer: moved on"),
            ],
            5,
        );
        let outcome = agent.run("q").await.unwrap();
        let observation = outcome.trace.steps()[0].observation.as_deref().unwrap();
        assert!(observation.contains("downstream service unavailable"));
        assert_eq!(outcome.answer, "moved on");
    }

    #[tokio::test]
    async fn malformed_output_consumes_a_step_and_continues() {
        let agent = agent(
            vec![Ok("rambling with no directive"), Ok("Final Answer: ok")],
            5,
        );
        let outcome = agent.run("q").await.unwrap();
        assert_eq!(outcome.trace.len(), 1);
        assert!(outcome.trace.steps()[0]
            .observation
            .as_deref()
            .unwrap()
            .contains("could not be interpreted"));
        assert_eq!(outcome.answer, "ok");
    }

    #[tokio::test]
    async fn step_budget_triggers_synthesis() {
        let agent = agent(
            vec![
                Ok("Action: echo\nAction Input: one"),
                Ok("Action: echo\nAction Input: two"),
                Ok("best effort from the trace"),
            ],
            2,
        );
        let outcome = agent.run("q").await.unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(outcome.trace.len(), 2);
        assert_eq!(outcome.answer, "best effort from the trace");
    }

    #[tokio::test]
    async fn trace_never_exceeds_budget() {
        let replies = vec![
            Ok("Action: echo\nAction Input: a"),
            Ok("Action: echo\nAction Input: b"),
            Ok("Action: echo\nAction Input: c"),
            Ok("synthesized"),
        ];
        let agent = agent(replies, 3);
        let outcome = agent.run("q").await.unwrap();
        assert!(outcome.trace.len() <= 3);
    }

    #[tokio::test]
    async fn synthesis_failure_still_returns_an_answer() {
        let agent = agent(
            vec![
                Ok("Action: echo\nAction Input: only"),
                Err("backend down"),
            ],
            1,
        );
        let outcome = agent.run("q").await.unwrap();
        assert!(outcome.stopped_early);
        assert!(outcome.answer.contains("echo: only"));
    }

    #[tokio::test]
    async fn backend_failure_during_thinking_is_fatal_for_the_request() {
        let agent = agent(vec![Err("connection refused")], 5);
        let err = agent.run("q").await.unwrap_err();
        assert!(matches!(err, AgentError::Backend(_)));
    }
}

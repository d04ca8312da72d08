//! Model integration: backends, the reasoning loop, and the dual dispatcher.

mod agent;
mod backend;
mod dispatch;
mod react;
mod scan;

pub use agent::{ActionRecord, AgentError, AgentOutcome, ReasonAgent, ReasoningStep, Trace};
pub use backend::{
    complete_with_retry, from_config, AnthropicBackend, BackendError, ChatBackend, OpenAiBackend,
};
pub use dispatch::{dispatch, estimate_tokens, BackendReport, DispatchError, DualVerdict};
pub use react::{parse as parse_directive, Directive, ParseError};
pub use scan::{render_verdict, ScanError, Scanner};

#[cfg(test)]
pub(crate) use backend::testing;

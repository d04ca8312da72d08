//! Prompt templates
//!
//! The ReAct template is rendered with the capability roster and the trace
//! so far; the one-shot templates back the code tools and the vulnerability
//! scanner. Placeholders are substituted with `str::replace` because the
//! templates themselves are full of braces.

use crate::llm::Trace;
use crate::tools::ToolRegistry;

/// System prompt for the reasoning loop.
pub const AGENT_SYSTEM: &str = "\
You are an agent that helps the user with IP/DNS reconnaissance and code \
analysis. Be as helpful as possible. If you are unable to produce an answer \
that is helpful to the user, say so. The user is allowed to look up \
information related to IP addresses, DNS names, and programming ONLY; deny \
them in any other case. Because your tools provide a lot of dense \
information, structure your final response by separating each tool call's \
answer in a visually pleasing list, with proper whitespace.";

/// ReAct protocol template. `{tools}`, `{tool_names}`, `{input}`, and
/// `{scratchpad}` are substituted by [`render_react`].
const REACT_TEMPLATE: &str = "\
You have access to the following tools:

{tools}

To use a tool, please use the following format:

    Thought: Do I need to use a tool? Yes
    Action: the action to take, should be one of [{tool_names}]
    Action Input: the input to the action
    Observation: the result of the action

When you have a response to say to the Human, or if you do not need to use a \
tool, you MUST use the format:

    Thought: Do I need to use a tool? No
    Final Answer: [your response here]

Do not attach backticks to any of your outputs, including thoughts, tool \
calls and final answers.

Begin!

New input: {input}

{scratchpad}";

/// System prompt for the early-stop synthesis call: no tools, answer from
/// the trace alone.
pub const SYNTHESIZE_SYSTEM: &str = "\
You are finishing a research session that ran out of tool-call budget. \
Using only the observations already gathered, produce the best available \
answer to the user's question. If the observations are insufficient, say \
what was learned and what remains unknown. Do not request any further tool \
use.";

pub const DEOBFUSCATE_PROMPT: &str = "\
You are an intelligent AI code deobfuscation bot. Your directive is to take \
a piece of code and deobfuscate it, making it more understandable to the \
human programmer. Take each piece of deobfuscation step-by-step, so that \
the final result is a block of code that makes sense as a whole, and the \
purpose of the code is understandable. Improve any potentially confusing \
variable names with better, self-documenting names. Your final answer MUST \
be in code format - output only a string of code with no backticks.";

pub const COMMENT_PROMPT: &str = "\
You are an intelligent AI code documentation bot. Your directive is to take \
a piece of code and add clear, concise comments explaining what each \
non-obvious section does, without changing the code itself. Your final \
answer MUST be in code format - output only the commented code with no \
backticks.";

pub const SCAN_PROMPT: &str = "\
You are a security code reviewer. Analyze the following source code for \
vulnerabilities: memory safety issues, injection, unsafe input handling, \
insecure API use, and logic flaws. Report each finding with the affected \
line or function, the class of vulnerability, and a suggested fix. If the \
code appears safe, say so explicitly.";

/// Render the model-facing capability roster: one line of name/description,
/// then the compact input schema.
pub fn render_roster(registry: &ToolRegistry) -> String {
    registry
        .iter()
        .map(|tool| {
            format!(
                "{}: {}\n  input schema: {}",
                tool.name(),
                tool.description(),
                tool.schema()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the agent scratchpad from the trace so far.
pub fn render_scratchpad(trace: &Trace) -> String {
    let mut out = String::new();
    for step in trace.steps() {
        if let Some(thought) = &step.thought {
            out.push_str(&format!("Thought: {thought}\n"));
        }
        if let Some(action) = &step.action {
            out.push_str(&format!("Action: {}\n", action.tool));
            out.push_str(&format!("Action Input: {}\n", action.input));
        }
        if let Some(observation) = &step.observation {
            out.push_str(&format!("Observation: {observation}\n"));
        }
    }
    out
}

/// Render the full ReAct prompt for one thinking step.
pub fn render_react(question: &str, registry: &ToolRegistry, trace: &Trace) -> String {
    REACT_TEMPLATE
        .replace("{tools}", &render_roster(registry))
        .replace("{tool_names}", &registry.names().join(", "))
        .replace("{input}", question)
        .replace("{scratchpad}", &render_scratchpad(trace))
}

/// Render the early-stop synthesis prompt.
pub fn render_synthesis(question: &str, trace: &Trace) -> String {
    format!(
        "Original question: {question}\n\nGathered so far:\n{}\nBest available answer:",
        render_scratchpad(trace)
    )
}

/// Wrap source code as the user half of a one-shot analysis call; the task
/// prompt itself goes in as the system message.
pub fn render_code_task(code: &str) -> String {
    format!("Code content:\n{code}")
}

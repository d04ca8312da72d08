//! Parser for the ReAct text protocol
//!
//! The model replies in one of two shapes:
//!
//! ```text
//! Thought: Do I need to use a tool? Yes
//! Action: reverse_dns
//! Action Input: 8.8.8.8
//! ```
//!
//! ```text
//! Thought: Do I need to use a tool? No
//! Final Answer: the hostname is dns.google
//! ```
//!
//! Anything else is a parse error, which the reasoning loop feeds back to
//! the model as an observation rather than treating as fatal.

use fancy_regex::Regex;
use thiserror::Error;

/// A parsed model directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Act {
        thought: Option<String>,
        action: String,
        input: String,
    },
    Answer {
        thought: Option<String>,
        text: String,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("output contained an Action but no Action Input")]
    MissingActionInput,

    #[error("output contained neither an Action nor a Final Answer")]
    NoDirective,
}

fn first_capture(pattern: &str, text: &str) -> Option<String> {
    let re = Regex::new(pattern).unwrap();
    re.captures(text)
        .ok()
        .flatten()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Strip stray backtick fencing the model was told not to emit but
/// sometimes does anyway.
fn strip_backticks(text: &str) -> String {
    text.trim().trim_matches('`').trim().to_string()
}

/// Parse one model reply into a directive.
pub fn parse(output: &str) -> Result<Directive, ParseError> {
    let thought = first_capture(r"(?m)^\s*Thought:\s*(.+)$", output);

    // Final Answer wins over Action when both appear: the model has decided
    // to stop, and the trailing answer is what the user should see.
    if let Some(idx) = output.find("Final Answer:") {
        let text = strip_backticks(&output[idx + "Final Answer:".len()..]);
        return Ok(Directive::Answer { thought, text });
    }

    let action = first_capture(r"(?m)^\s*Action:\s*(.+)$", output);
    if let Some(action) = action {
        let input = first_capture(r"(?m)^\s*Action Input:\s*(.+)$", output)
            .ok_or(ParseError::MissingActionInput)?;
        return Ok(Directive::Act {
            thought,
            action: strip_backticks(&action),
            input: strip_backticks(&input),
        });
    }

    Err(ParseError::NoDirective)
}

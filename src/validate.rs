//! Input validation
//!
//! Every capability input passes through [`validate`] before execution.
//! Each kind has a strict shape check; the returned string is the cleaned
//! value (quotes stripped, whitespace trimmed), never the raw input.

use std::fmt;
use std::net::Ipv4Addr;

use fancy_regex::Regex;
use thiserror::Error;

/// The shape an input field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A bare IPv4 address. CIDR notation is explicitly rejected.
    Ipv4,
    /// A DNS hostname with at least two labels.
    Hostname,
    /// A plain filename with an extension and no directory parts.
    Filename,
    /// Any non-empty text.
    Text,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Ipv4 => "IPv4 address",
            FieldKind::Hostname => "hostname",
            FieldKind::Filename => "filename",
            FieldKind::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field} {value:?}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate one raw input against a field kind, returning the cleaned value.
pub fn validate(field: &str, kind: FieldKind, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    match kind {
        FieldKind::Ipv4 => validate_ipv4(field, trimmed),
        FieldKind::Hostname => validate_hostname(field, trimmed),
        FieldKind::Filename => validate_filename(field, trimmed),
        FieldKind::Text => {
            if trimmed.is_empty() {
                Err(ValidationError::new(field, raw, "must not be empty"))
            } else {
                Ok(trimmed.to_string())
            }
        }
    }
}

fn validate_ipv4(field: &str, value: &str) -> Result<String, ValidationError> {
    if value.contains('/') {
        return Err(ValidationError::new(
            field,
            value,
            "CIDR notation is not accepted, give a single address",
        ));
    }
    value
        .parse::<Ipv4Addr>()
        .map(|addr| addr.to_string())
        .map_err(|_| ValidationError::new(field, value, "not a well-formed IPv4 address"))
}

fn validate_hostname(field: &str, value: &str) -> Result<String, ValidationError> {
    let err = |reason: &str| Err(ValidationError::new(field, value, reason));

    if value.is_empty() {
        return err("must not be empty");
    }
    if value.len() > 253 {
        return err("longer than 253 characters");
    }

    let labels: Vec<&str> = value.split('.').collect();
    if labels.len() < 2 {
        return err("needs at least two dot-separated labels");
    }
    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return err("each label must be 1 to 63 characters");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return err("labels may only contain letters, digits, and hyphens");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return err("labels may not start or end with a hyphen");
        }
    }
    // An all-digit final label would make the whole name look like an IP.
    if labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()))
    {
        return err("top-level label may not be all digits");
    }
    Ok(value.to_ascii_lowercase())
}

fn validate_filename(field: &str, value: &str) -> Result<String, ValidationError> {
    // Starts and ends alphanumeric, dots/underscores/hyphens inside, one
    // mandatory extension. Anchored, so path separators never slip through.
    static PATTERN: &str = r"^[a-zA-Z0-9](?:[a-zA-Z0-9._-]*[a-zA-Z0-9])?\.[a-zA-Z0-9_-]+$";

    let unquoted = value
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    let re = Regex::new(PATTERN).unwrap();
    match re.find(unquoted) {
        Ok(Some(m)) => Ok(m.as_str().to_string()),
        _ => Err(ValidationError::new(
            field,
            value,
            "must be a plain filename with an extension and no directory parts",
        )),
    }
}

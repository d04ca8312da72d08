//! Capability (tool) system
//!
//! Each capability declares a name, a human-readable description, and an
//! ordered input schema. Inputs are validated against the schema before
//! `invoke` ever runs; `invoke` converts its own failures into a typed
//! `ToolError` rather than propagating a raw fault.

mod code;
mod ip_info;
mod recon;
mod terminal;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::validate::{self, FieldKind, ValidationError};

pub use code::{CommentCodeTool, DeobfuscateTool};
pub use ip_info::IpLocationTool;
pub use recon::{DnsRecordsTool, PingTool, ResolveHostTool, ReverseDnsTool};
pub use terminal::TerminalTool;

/// One named input field of a capability.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

/// A capability input that has passed its full validation predicate.
///
/// The only way to construct one outside this module is through
/// [`ToolRegistry::validate_input`], so `invoke` never sees unchecked data.
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    value: String,
}

impl ValidatedInput {
    fn new(value: String) -> Self {
        Self { value }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// Failure modes of a capability.
///
/// "Not found" is deliberately distinct from "malformed input": a capability
/// that reads a file signals a missing file differently from a bad filename.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A named, schema-validated external action.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Ordered input schema. All current capabilities take a single field;
    /// the slice keeps the contract explicit.
    fn fields(&self) -> &'static [FieldSpec];

    /// JSON schema rendered into the model-facing capability roster.
    /// Derived from [`Tool::fields`]: every declared field is a required
    /// string property.
    fn schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in self.fields() {
            properties.insert(
                field.name.to_string(),
                serde_json::json!({
                    "type": "string",
                    "description": field.description,
                }),
            );
            required.push(field.name);
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Execute the capability. The input has already passed validation.
    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError>;
}

/// Registry of available capabilities.
///
/// Immutable once built and shared behind `Arc`; iteration order is
/// registration order, which is also the order shown to the model.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug_assert!(
            self.get(tool.name()).is_none(),
            "duplicate tool name {}",
            tool.name()
        );
        self.tools.push(tool);
    }

    /// Look up a capability by name. An unknown name is a recoverable
    /// condition for the caller, not a panic.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Validate a raw action input against a capability's schema.
    ///
    /// Every declared field must accept the input, in declaration order,
    /// and each check runs on the previous one's cleaned value. This is
    /// the single gate through which capability inputs pass; it upholds
    /// the invariant that `invoke` only ever receives checked data.
    pub fn validate_input(
        &self,
        tool: &dyn Tool,
        raw: &str,
    ) -> Result<ValidatedInput, ValidationError> {
        let mut fields = tool.fields().iter();
        let Some(first) = fields.next() else {
            return Err(ValidationError {
                field: "input".to_string(),
                value: raw.to_string(),
                reason: "capability declares no input fields".to_string(),
            });
        };
        let mut value = validate::validate(first.name, first.kind, raw)?;
        for field in fields {
            value = validate::validate(field.name, field.kind, &value)?;
        }
        Ok(ValidatedInput::new(value))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A fixed-field capability for loop and registry tests.
    pub struct StaticTool {
        pub tool_name: &'static str,
        pub spec: &'static [FieldSpec],
        pub response: Result<&'static str, &'static str>,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &'static str {
            self.tool_name
        }

        fn description(&self) -> &'static str {
            "test capability"
        }

        fn fields(&self) -> &'static [FieldSpec] {
            self.spec
        }

        async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
            match self.response {
                Ok(text) => Ok(format!("{text}{}", input.as_str())),
                Err(message) => Err(ToolError::failed(message)),
            }
        }
    }

    pub const TEXT_FIELD: &[FieldSpec] = &[FieldSpec {
        name: "text",
        kind: FieldKind::Text,
        description: "Any non-empty text",
    }];

    pub const IPV4_FIELD: &[FieldSpec] = &[FieldSpec {
        name: "address",
        kind: FieldKind::Ipv4,
        description: "An IPv4 address with no CIDR notation",
    }];
}

#[cfg(test)]
mod tests {
    use super::testing::{StaticTool, IPV4_FIELD, TEXT_FIELD};
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(StaticTool {
            tool_name: "echo",
            spec: TEXT_FIELD,
            response: Ok("echo: "),
        }));
        registry.register(Arc::new(StaticTool {
            tool_name: "addr",
            spec: IPV4_FIELD,
            response: Ok("ok: "),
        }));
        registry
    }

    #[test]
    fn lookup_preserves_registration_order() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["echo", "addr"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn schema_is_derived_from_fields() {
        let registry = registry();
        let schema = registry.get("echo").unwrap().schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"][0], "text");
    }

    #[test]
    fn empty_field_schema_is_rejected_not_indexed() {
        let registry = ToolRegistry::empty();
        let bare = StaticTool {
            tool_name: "bare",
            spec: &[],
            response: Ok(""),
        };
        let err = registry.validate_input(&bare, "anything").unwrap_err();
        assert!(err.reason.contains("no input fields"));
    }

    #[test]
    fn every_declared_field_is_checked_in_order() {
        const STRICT: &[FieldSpec] = &[
            FieldSpec {
                name: "raw",
                kind: FieldKind::Text,
                description: "Any non-empty text",
            },
            FieldSpec {
                name: "address",
                kind: FieldKind::Ipv4,
                description: "An IPv4 address",
            },
        ];
        let registry = ToolRegistry::empty();
        let tool = StaticTool {
            tool_name: "strict",
            spec: STRICT,
            response: Ok("ok: "),
        };
        assert!(registry.validate_input(&tool, "203.0.113.5").is_ok());
        let err = registry.validate_input(&tool, "www.example.com").unwrap_err();
        assert_eq!(err.field, "address");
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_invoke() {
        let registry = registry();
        let tool = registry.get("addr").unwrap();

        let err = registry.validate_input(tool, "203.0.113.5/24").unwrap_err();
        assert_eq!(err.field, "address");

        let input = registry.validate_input(tool, "203.0.113.5").unwrap();
        assert_eq!(tool.invoke(input).await.unwrap(), "ok: 203.0.113.5");
    }
}

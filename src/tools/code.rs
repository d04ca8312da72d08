//! Code transformation capabilities
//!
//! deobfuscate_code and comment_code read a source file, run it through the
//! backend with a one-shot prompt, and write the result next to the input as
//! `deobfuscated_<name>` or `commented_<name>`. The output file is only
//! written after the model call succeeds; a failed run leaves no artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{FieldSpec, Tool, ToolError, ValidatedInput};
use crate::llm::ChatBackend;
use crate::prompts;
use crate::validate::FieldKind;

const FILENAME_FIELD: &[FieldSpec] = &[FieldSpec {
    name: "filename",
    kind: FieldKind::Filename,
    description: "A plain filename with an extension, such as script.py, with no directory parts",
}];

async fn read_source(path: &Path) -> Result<String, ToolError> {
    match tokio::fs::read_to_string(path).await {
        Ok(code) => Ok(code),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ToolError::NotFound {
            what: "file",
            name: path.display().to_string(),
        }),
        Err(e) => Err(ToolError::failed(format!(
            "could not read {}: {e}",
            path.display()
        ))),
    }
}

/// Models sometimes fence their output despite being told not to.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence, if any.
    match rest.split_once('\n') {
        Some((_, body)) => body.trim_matches('\n'),
        None => rest.trim(),
    }
}

async fn transform_file(
    backend: &dyn ChatBackend,
    working_dir: &Path,
    filename: &str,
    task_prompt: &str,
    output_prefix: &str,
) -> Result<String, ToolError> {
    let source_path = working_dir.join(filename);
    let code = read_source(&source_path).await?;
    debug!(path = %source_path.display(), bytes = code.len(), "code task: source loaded");

    let result = backend
        .complete(task_prompt, &prompts::render_code_task(&code))
        .await
        .map_err(|e| ToolError::failed(format!("model call failed: {e}")))?;

    let output_path = working_dir.join(format!("{output_prefix}{filename}"));
    tokio::fs::write(&output_path, strip_code_fences(&result))
        .await
        .map_err(|e| {
            ToolError::failed(format!("could not write {}: {e}", output_path.display()))
        })?;

    info!(path = %output_path.display(), "code task: output written");
    Ok(format!("Wrote {}", output_path.display()))
}

/// Rewrite an obfuscated source file into readable form.
pub struct DeobfuscateTool {
    backend: Arc<dyn ChatBackend>,
    working_dir: PathBuf,
}

impl DeobfuscateTool {
    pub fn new(backend: Arc<dyn ChatBackend>, working_dir: PathBuf) -> Self {
        Self {
            backend,
            working_dir,
        }
    }
}

#[async_trait]
impl Tool for DeobfuscateTool {
    fn name(&self) -> &'static str {
        "deobfuscate_code"
    }

    fn description(&self) -> &'static str {
        "Given the filename of an obfuscated source file in the working \
         directory, writes a deobfuscated version as deobfuscated_<filename>."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FILENAME_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        transform_file(
            self.backend.as_ref(),
            &self.working_dir,
            input.as_str(),
            prompts::DEOBFUSCATE_PROMPT,
            "deobfuscated_",
        )
        .await
    }
}

/// Annotate a source file with explanatory comments.
pub struct CommentCodeTool {
    backend: Arc<dyn ChatBackend>,
    working_dir: PathBuf,
}

impl CommentCodeTool {
    pub fn new(backend: Arc<dyn ChatBackend>, working_dir: PathBuf) -> Self {
        Self {
            backend,
            working_dir,
        }
    }
}

#[async_trait]
impl Tool for CommentCodeTool {
    fn name(&self) -> &'static str {
        "comment_code"
    }

    fn description(&self) -> &'static str {
        "Given the filename of a source file in the working directory, writes \
         a commented version as commented_<filename>."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        FILENAME_FIELD
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        transform_file(
            self.backend.as_ref(),
            &self.working_dir,
            input.as_str(),
            prompts::COMMENT_PROMPT,
            "commented_",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use crate::tools::ToolRegistry;
    use pretty_assertions::assert_eq;

    fn validated(tool: &dyn Tool, raw: &str) -> ValidatedInput {
        ToolRegistry::empty().validate_input(tool, raw).unwrap()
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("```\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("x = 1"), "x = 1");
        assert_eq!(strip_code_fences("```unterminated"), "```unterminated");
    }

    #[tokio::test]
    async fn deobfuscation_writes_a_prefixed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mess.py"), "exec('cHJpbnQoMSk=')").unwrap();

        let tool = DeobfuscateTool::new(
            Arc::new(ScriptedBackend::new("model", vec![Ok("print(1)")])),
            dir.path().to_path_buf(),
        );
        let summary = tool.invoke(validated(&tool, "mess.py")).await.unwrap();
        assert!(summary.contains("deobfuscated_mess.py"));

        let written = std::fs::read_to_string(dir.path().join("deobfuscated_mess.py")).unwrap();
        assert_eq!(written, "print(1)");
    }

    #[tokio::test]
    async fn commenting_strips_fences_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain.py"), "x = 1").unwrap();

        let tool = CommentCodeTool::new(
            Arc::new(ScriptedBackend::new(
                "model",
                vec![Ok("```python\n# counter\nx = 1\n```")],
            )),
            dir.path().to_path_buf(),
        );
        tool.invoke(validated(&tool, "plain.py")).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("commented_plain.py")).unwrap();
        assert_eq!(written, "# counter\nx = 1");
    }

    #[tokio::test]
    async fn missing_file_reports_not_found_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let tool = DeobfuscateTool::new(
            Arc::new(ScriptedBackend::new("model", vec![Ok("unused")])),
            dir.path().to_path_buf(),
        );
        let err = tool.invoke(validated(&tool, "absent.py")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { what: "file", .. }));
        assert!(!dir.path().join("deobfuscated_absent.py").exists());
    }

    #[tokio::test]
    async fn model_failure_leaves_no_output_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.py"), "x = 1").unwrap();

        let tool = CommentCodeTool::new(
            Arc::new(ScriptedBackend::new("model", vec![Err("rate limited")])),
            dir.path().to_path_buf(),
        );
        let err = tool.invoke(validated(&tool, "code.py")).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
        assert!(!dir.path().join("commented_code.py").exists());
    }
}

//! Terminal capability: run a shell command with a bounded timeout

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{FieldSpec, Tool, ToolError, ValidatedInput};
use crate::validate::FieldKind;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_OUTPUT: usize = 50_000;

/// Runs an arbitrary shell command and reports combined output.
pub struct TerminalTool {
    timeout: Duration,
}

impl TerminalTool {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TerminalTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command on the local machine and return its output. \
         Output is truncated past 50KB and the command is killed after the \
         configured timeout."
    }

    fn fields(&self) -> &'static [FieldSpec] {
        &[FieldSpec {
            name: "command",
            kind: FieldKind::Text,
            description: "The shell command to run, e.g. `ls -la` or `whoami`",
        }]
    }

    async fn invoke(&self, input: ValidatedInput) -> Result<String, ToolError> {
        let command = input.as_str();
        debug!(command, "terminal: spawning");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| ToolError::failed(format!("Failed to spawn command: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::failed(format!("Wait failed: {e}"))),
            Err(_) => {
                return Err(ToolError::failed(format!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                )))
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str("[stderr]\n");
            combined.push_str(&stderr);
        }

        if combined.is_empty() {
            combined = "(no output)".to_string();
        }

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            combined.push_str(&format!("\n[exit code: {exit_code}]"));
        }

        Ok(truncate_output(combined))
    }
}

/// Truncate at a UTF-8 boundary at or before `MAX_OUTPUT`.
fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT {
        return output;
    }
    let mut end = MAX_OUTPUT;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n\n[... output truncated ({} bytes total)]",
        &output[..end],
        output.len()
    )
}

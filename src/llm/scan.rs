//! Vulnerability scanner front end
//!
//! Takes a filename, validates it, reads the source, and sends it through
//! the dual dispatcher so two independent models review the same code. The
//! verdict carries both reports; a single-model verdict is never produced.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::backend::ChatBackend;
use super::dispatch::{self, DispatchError, DualVerdict};
use crate::prompts;
use crate::validate::{self, FieldKind, ValidationError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    InvalidFilename(#[from] ValidationError),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Dual-model code scanner.
pub struct Scanner {
    primary: Arc<dyn ChatBackend>,
    secondary: Arc<dyn ChatBackend>,
    working_dir: PathBuf,
    max_prompt_tokens: usize,
}

impl Scanner {
    pub fn new(
        primary: Arc<dyn ChatBackend>,
        secondary: Arc<dyn ChatBackend>,
        working_dir: PathBuf,
        max_prompt_tokens: usize,
    ) -> Self {
        Self {
            primary,
            secondary,
            working_dir,
            max_prompt_tokens,
        }
    }

    /// Scan one file and return both backends' reports.
    pub async fn scan_file(&self, raw_filename: &str) -> Result<DualVerdict, ScanError> {
        let filename = validate::validate("filename", FieldKind::Filename, raw_filename)?;
        let path = self.working_dir.join(&filename);

        let code = read_source(&path).await?;
        info!(path = %path.display(), bytes = code.len(), "scanning file with both backends");

        let verdict = dispatch::dispatch(
            prompts::SCAN_PROMPT,
            &code,
            self.primary.as_ref(),
            self.secondary.as_ref(),
            self.max_prompt_tokens,
        )
        .await?;
        Ok(verdict)
    }
}

async fn read_source(path: &Path) -> Result<String, ScanError> {
    match tokio::fs::read_to_string(path).await {
        Ok(code) => Ok(code),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ScanError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(ScanError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Format a verdict for the terminal, one section per backend.
pub fn render_verdict(verdict: &DualVerdict) -> String {
    format!(
        "=== Report from {} ===\n{}\n\n=== Report from {} ===\n{}",
        verdict.primary.backend,
        verdict.primary.output.trim(),
        verdict.secondary.backend,
        verdict.secondary.output.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::super::backend::testing::ScriptedBackend;
    use super::*;
    use pretty_assertions::assert_eq;

    fn scanner(
        primary: ScriptedBackend,
        secondary: ScriptedBackend,
        dir: &Path,
        limit: usize,
    ) -> Scanner {
        Scanner::new(
            Arc::new(primary),
            Arc::new(secondary),
            dir.to_path_buf(),
            limit,
        )
    }

    #[tokio::test]
    async fn scans_an_existing_file_with_both_backends() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();

        let scanner = scanner(
            ScriptedBackend::new("alpha", vec![Ok("no issues")]),
            ScriptedBackend::new("beta", vec![Ok("looks safe")]),
            dir.path(),
            500,
        );
        let verdict = scanner.scan_file("app.py").await.unwrap();
        assert_eq!(verdict.primary.output, "no issues");
        assert_eq!(verdict.secondary.output, "looks safe");
    }

    #[tokio::test]
    async fn bad_filename_is_rejected_before_any_read() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(
            ScriptedBackend::new("alpha", vec![]),
            ScriptedBackend::new("beta", vec![]),
            dir.path(),
            500,
        );
        let err = scanner.scan_file("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn missing_file_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(
            ScriptedBackend::new("alpha", vec![]),
            ScriptedBackend::new("beta", vec![]),
            dir.path(),
            500,
        );
        let err = scanner.scan_file("absent.py").await.unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[tokio::test]
    async fn oversized_source_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let big = "x".repeat(4 * 500 + 4);
        std::fs::write(dir.path().join("big.py"), &big).unwrap();

        let scanner = scanner(
            ScriptedBackend::new("alpha", vec![]),
            ScriptedBackend::new("beta", vec![]),
            dir.path(),
            500,
        );
        let err = scanner.scan_file("big.py").await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Dispatch(DispatchError::TooLarge { .. })
        ));
    }

    #[test]
    fn verdict_rendering_names_both_backends() {
        let verdict = DualVerdict {
            primary: super::super::dispatch::BackendReport {
                backend: "alpha".to_string(),
                output: "report one".to_string(),
            },
            secondary: super::super::dispatch::BackendReport {
                backend: "beta".to_string(),
                output: "report two".to_string(),
            },
        };
        let rendered = render_verdict(&verdict);
        assert!(rendered.contains("=== Report from alpha ==="));
        assert!(rendered.contains("report two"));
    }
}

//! Dual-backend dispatcher
//!
//! Sends the same prompt to two independent backends concurrently and
//! succeeds only when both do. A prompt over the token ceiling is refused
//! before either backend is contacted.

use thiserror::Error;
use tracing::{debug, info};

use super::backend::{BackendError, ChatBackend};

/// Rough token estimate: four characters per token, rounded up. Good enough
/// to keep oversized prompts from ever reaching a backend.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("prompt is an estimated {estimated} tokens, over the {limit} token limit")]
    TooLarge { estimated: usize, limit: usize },

    #[error("backend {backend} failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },
}

/// One backend's contribution to a dual verdict.
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub backend: String,
    pub output: String,
}

/// Both backends' outputs for one prompt. Exists only when both succeeded.
#[derive(Debug, Clone)]
pub struct DualVerdict {
    pub primary: BackendReport,
    pub secondary: BackendReport,
}

/// Dispatch one prompt to both backends and collect both outputs.
///
/// Either backend failing fails the whole dispatch; a partial verdict is
/// never returned.
pub async fn dispatch(
    system: &str,
    prompt: &str,
    primary: &dyn ChatBackend,
    secondary: &dyn ChatBackend,
    max_prompt_tokens: usize,
) -> Result<DualVerdict, DispatchError> {
    let estimated = estimate_tokens(prompt);
    if estimated > max_prompt_tokens {
        info!(estimated, limit = max_prompt_tokens, "refusing oversized prompt");
        return Err(DispatchError::TooLarge {
            estimated,
            limit: max_prompt_tokens,
        });
    }

    debug!(
        primary = primary.name(),
        secondary = secondary.name(),
        estimated,
        "dispatching to both backends"
    );

    let run_primary = async {
        match primary.complete(system, prompt).await {
            Ok(output) => Ok(BackendReport {
                backend: primary.name().to_string(),
                output,
            }),
            Err(source) => Err(DispatchError::Backend {
                backend: primary.name().to_string(),
                source,
            }),
        }
    };
    let run_secondary = async {
        match secondary.complete(system, prompt).await {
            Ok(output) => Ok(BackendReport {
                backend: secondary.name().to_string(),
                output,
            }),
            Err(source) => Err(DispatchError::Backend {
                backend: secondary.name().to_string(),
                source,
            }),
        }
    };

    let (primary, secondary) = tokio::try_join!(run_primary, run_secondary)?;
    Ok(DualVerdict { primary, secondary })
}

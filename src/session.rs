//! Interactive session loop
//!
//! Reads queries from stdin until the user types `exit`, submits an empty
//! line, or closes the stream. A failed query is printed and logged but
//! never ends the session; only a failure to read stdin itself does.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

use crate::llm::{self, ReasonAgent, Scanner};
use crate::tools::ToolRegistry;

const PROMPT: &str = "Enter query (\"exit\" to end) >> ";

enum Engine {
    Agent {
        agent: ReasonAgent,
        registry: Arc<ToolRegistry>,
    },
    Scan(Scanner),
}

pub struct Session {
    engine: Engine,
}

impl Session {
    pub fn agent(agent: ReasonAgent, registry: Arc<ToolRegistry>) -> Self {
        Self {
            engine: Engine::Agent { agent, registry },
        }
    }

    pub fn scanner(scanner: Scanner) -> Self {
        Self {
            engine: Engine::Scan(scanner),
        }
    }

    fn banner(&self) -> String {
        match &self.engine {
            Engine::Agent { registry, .. } => format!(
                "Ask about IP addresses, DNS names, or code. Available capabilities: {}.",
                registry.names().join(", ")
            ),
            Engine::Scan(_) => {
                "Give a filename in the working directory to scan for vulnerabilities.".to_string()
            }
        }
    }

    async fn handle(&self, query: &str) -> Result<String> {
        match &self.engine {
            Engine::Agent { agent, .. } => {
                let outcome = agent.run(query).await?;
                if outcome.stopped_early {
                    info!(steps = outcome.trace.len(), "answer synthesized after early stop");
                }
                Ok(outcome.answer)
            }
            Engine::Scan(scanner) => {
                let verdict = scanner.scan_file(query).await?;
                Ok(llm::render_verdict(&verdict))
            }
        }
    }

    /// Run the loop to completion. Returns when the user ends the session.
    pub async fn run(&self) -> Result<()> {
        println!("{}", self.banner());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("{PROMPT}");
            std::io::stdout().flush().context("Failed to flush stdout")?;

            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                break;
            };
            let query = line.trim();
            if query.is_empty() || query == "exit" {
                break;
            }

            info!(query, "handling query");
            match self.handle(query).await {
                Ok(answer) => println!("\n{answer}\n"),
                Err(e) => {
                    error!(error = %e, "query failed");
                    eprintln!("error: {e:#}");
                }
            }
        }

        println!("Goodbye.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedBackend;
    use crate::tools::testing::{StaticTool, TEXT_FIELD};
    use pretty_assertions::assert_eq;

    fn agent_session(replies: Vec<Result<&str, &str>>) -> Session {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(StaticTool {
            tool_name: "echo",
            spec: TEXT_FIELD,
            response: Ok("echo: "),
        }));
        let registry = Arc::new(registry);
        let agent = ReasonAgent::new(
            Arc::new(ScriptedBackend::new("scripted", replies)),
            Arc::clone(&registry),
            5,
            0,
        );
        Session::agent(agent, registry)
    }

    #[test]
    fn agent_banner_lists_capabilities() {
        let session = agent_session(vec![]);
        assert!(session.banner().contains("echo"));
    }

    #[tokio::test]
    async fn handle_returns_the_final_answer() {
        let session = agent_session(vec![Ok("Final Answer: all done")]);
        let answer = session.handle("anything").await.unwrap();
        assert_eq!(answer, "all done");
    }

    #[tokio::test]
    async fn handle_surfaces_backend_failure_as_error() {
        let session = agent_session(vec![Err("connection refused")]);
        assert!(session.handle("anything").await.is_err());
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil::config::Config;
use vigil::llm::{self, ReasonAgent, Scanner};
use vigil::session::Session;
use vigil::tools::{
    CommentCodeTool, DeobfuscateTool, DnsRecordsTool, IpLocationTool, PingTool, ResolveHostTool,
    ReverseDnsTool, TerminalTool, ToolRegistry,
};

#[derive(Parser)]
#[command(name = "vigil", version, about = "Terminal assistant for IP/DNS recon and code analysis")]
struct Args {
    /// Alternate config file (default: ~/.config/vigil/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session mode
    #[arg(long, value_enum, default_value_t = Mode::Agent)]
    mode: Mode,

    /// Directory the code tools and the scanner read from and write to
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Interactive reasoning agent with the full capability roster
    Agent,
    /// Dual-model vulnerability scanner
    Scan,
}

fn init_logging(path: &std::path::Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(file)
        .with_ansi(false)
        .init();
    Ok(())
}

fn build_registry(
    backend: &Arc<dyn llm::ChatBackend>,
    working_dir: &std::path::Path,
) -> ToolRegistry {
    let mut registry = ToolRegistry::empty();
    registry.register(Arc::new(TerminalTool::new()));
    registry.register(Arc::new(ReverseDnsTool));
    registry.register(Arc::new(ResolveHostTool));
    registry.register(Arc::new(DnsRecordsTool));
    registry.register(Arc::new(IpLocationTool::new()));
    registry.register(Arc::new(PingTool::new()));
    registry.register(Arc::new(DeobfuscateTool::new(
        Arc::clone(backend),
        working_dir.to_path_buf(),
    )));
    registry.register(Arc::new(CommentCodeTool::new(
        Arc::clone(backend),
        working_dir.to_path_buf(),
    )));
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    init_logging(&config.general.log_file)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting vigil");

    let primary = llm::from_config(&config.backends.primary)?;

    let session = match args.mode {
        Mode::Agent => {
            let registry = Arc::new(build_registry(&primary, &args.working_dir));
            let agent = ReasonAgent::new(
                primary,
                Arc::clone(&registry),
                config.agent.max_steps,
                config.general.max_retries,
            );
            Session::agent(agent, registry)
        }
        Mode::Scan => {
            let secondary = llm::from_config(&config.backends.secondary)?;
            Session::scanner(Scanner::new(
                primary,
                secondary,
                args.working_dir.clone(),
                config.scanner.max_prompt_tokens,
            ))
        }
    };

    session.run().await
}

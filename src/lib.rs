//! vigil: a terminal assistant for IP/DNS reconnaissance and code analysis.
//!
//! The library is organized around three pieces:
//!
//! * [`tools`]: the capability registry. Each capability declares an input
//!   schema and only ever executes validated input.
//! * [`llm`]: model backends behind the [`llm::ChatBackend`] trait, the
//!   bounded ReAct reasoning loop, and the dual-backend dispatcher used by
//!   the vulnerability scanner.
//! * [`session`]: the interactive stdin loop that drives either mode.

pub mod config;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod tools;
pub mod validate;

pub use config::Config;
pub use session::Session;

//! Executor process: maintains one authenticated control-plane link for its
//! whole lifetime, reconnecting with backoff whenever the link breaks.

pub mod config;
pub mod dispatch;
pub mod run;

pub use config::AgentConfig;
pub use dispatch::{DispatchError, MessageHandler, NullHandler};
pub use run::{AgentError, run_agent};

//! Client side of one upstream MCP server.
//!
//! An [`McpSession`] owns a spawned child process speaking MCP over stdio.
//! The session is started with the configured command/args/env, performs the
//! `initialize` handshake within the configured deadline, and then serves
//! `list_tools` / `call_tool` until it is shut down or the child dies.
//!
//! Crash reporting goes through a callback port: whoever constructs the
//! session registers `on_terminated(server_name)` and is told when the
//! session ends for any reason other than an explicit shutdown.

mod error;
mod session;

pub use error::{McpClientError, Result};
pub use session::{McpSession, TerminationCallback};

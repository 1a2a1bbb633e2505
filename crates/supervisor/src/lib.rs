//! Lifecycle management for upstream MCP sessions.
//!
//! The [`ServerSupervisor`] keeps a table of live sessions keyed by server
//! name. Sessions start lazily on first use; concurrent acquires for the
//! same server coalesce onto a single start attempt; a periodic sweeper
//! evicts sessions that have sat idle past their TTL.
//!
//! Session creation goes through the [`SessionFactory`] port so tests can
//! substitute stub sessions for real child processes.

mod error;
mod ports;
mod supervisor;

pub use error::{Result, SupervisorError};
pub use ports::{RmcpSessionFactory, SessionFactory, ToolSession};
pub use supervisor::{RunningServerSnapshot, ServerLease, ServerState, ServerSupervisor};

//! The `semantic_router` meta-tool.
//!
//! One outward MCP tool multiplexes discovery, lifecycle, execution, and
//! content retrieval over the subsystems built in the sibling crates. The
//! dispatcher never fails at the transport level: every subsystem error
//! renders as an `ERROR:<KIND>: <message>` text part inside a well-formed
//! tool result.

mod executor;
mod ops;
mod processor;
mod render;
mod service;
mod transport;

pub use executor::ToolExecutor;
pub use ops::{Operation, ROUTER_TOOL_NAME};
pub use processor::ResultProcessor;
pub use service::RouterService;
pub use transport::{serve_http, serve_stdio};

//! Background execution pool.
//!
//! Tasks queue by `(priority desc, submission order)` and run on a fixed
//! set of workers. Execution itself goes through the [`ToolRunner`] port;
//! the pool only owns scheduling, status tracking, and backpressure.

mod pool;

pub use pool::{TaskPool, TaskSnapshot, TaskStatus, ToolRunner};

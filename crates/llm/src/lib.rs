//! Narrow ports to the language-model provider.
//!
//! The rest of the workspace only sees the [`Embedder`], [`Describer`], and
//! [`Vision`] traits; [`OpenAiClient`] implements all three against any
//! OpenAI-compatible REST endpoint.

mod error;
mod openai;
mod ports;

pub use error::{LlmError, Result};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use ports::{Describer, Embedder, Vision};

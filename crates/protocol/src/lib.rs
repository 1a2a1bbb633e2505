//! Shared protocol types for the tool-router workspace.
//!
//! Everything that crosses a crate boundary lives here: the servers-config
//! file format, tool records and result envelopes, the router error
//! taxonomy, and the environment-driven runtime settings.

pub mod config;
pub mod envelope;
pub mod error;
pub mod settings;

pub use config::{load_servers_config, ServerConfig, ServersConfig};
pub use envelope::{
    ContentKind, ContentRef, EnvelopePart, RawPart, RawToolResult, ResultEnvelope, ToolSpec,
};
pub use error::{ErrorKind, Result, RouterError};
pub use settings::Settings;

/// Approximate token count for a piece of text.
///
/// Four characters per token is the heuristic the chunking threshold is
/// defined against; exactness is not required, stability is.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_is_chars_over_four() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(20_000)), 5_000);
    }

    #[test]
    fn token_estimate_counts_chars_not_bytes() {
        // 4 multi-byte chars = 1 token, even though it is 12 bytes.
        assert_eq!(estimate_tokens("日本語文"), 1);
    }
}

use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

fn default_timeout_seconds() -> u64 {
    30
}

/// One upstream MCP server as declared in the servers-config file.
///
/// `name` is the key in the `mcpServers` map and is filled in after
/// deserialization so the struct can travel on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(skip)]
    pub name: String,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Startup handshake deadline; also the default `list_tools` deadline.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Free-text routing hints folded into every tool's description document.
    #[serde(default)]
    pub hints: Vec<String>,

    /// Tools that stay discoverable but are refused at execution time.
    #[serde(default)]
    pub blocked_tools: BTreeSet<String>,

    /// Skip this server entirely (indexing and serving).
    #[serde(default)]
    pub ignore: bool,

    /// Re-index this server even when records for it already exist.
    #[serde(default)]
    pub overwrite: bool,
}

/// The servers-config file: `{"mcpServers": {"<name>": {...}}}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServersConfig {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, ServerConfig>,
}

impl ServersConfig {
    /// Configured servers with `ignore=false`, names filled in.
    pub fn active_servers(&self) -> Vec<ServerConfig> {
        self.mcp_servers
            .values()
            .filter(|config| !config.ignore)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ServerConfig> {
        self.mcp_servers.get(name)
    }
}

/// Load and validate the servers-config file.
pub fn load_servers_config(path: &Path) -> Result<ServersConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RouterError::config(format!("read {}: {e}", path.display())))?;
    let mut config: ServersConfig = serde_json::from_str(&raw)
        .map_err(|e| RouterError::config(format!("parse {}: {e}", path.display())))?;
    for (name, server) in config.mcp_servers.iter_mut() {
        if name.trim().is_empty() {
            return Err(RouterError::config("server name must not be empty"));
        }
        if server.command.trim().is_empty() {
            return Err(RouterError::config(format!(
                "server '{name}': command must not be empty"
            )));
        }
        server.name = name.clone();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_config(r#"{"mcpServers": {"fs": {"command": "mcp-fs"}}}"#);
        let config = load_servers_config(file.path()).unwrap();
        let fs = config.get("fs").unwrap();
        assert_eq!(fs.name, "fs");
        assert_eq!(fs.command, "mcp-fs");
        assert_eq!(fs.timeout_seconds, 30);
        assert!(fs.args.is_empty());
        assert!(!fs.ignore);
        assert!(!fs.overwrite);
        assert!(fs.blocked_tools.is_empty());
    }

    #[test]
    fn loads_full_server_entry() {
        let file = write_config(
            r#"{"mcpServers": {"gh": {
                "command": "mcp-github",
                "args": ["--readonly"],
                "env": {"GITHUB_TOKEN": "t"},
                "timeout_seconds": 10,
                "hints": ["issues", "pull requests"],
                "blocked_tools": ["delete_repository"],
                "overwrite": true
            }}}"#,
        );
        let config = load_servers_config(file.path()).unwrap();
        let gh = config.get("gh").unwrap();
        assert_eq!(gh.args, vec!["--readonly"]);
        assert_eq!(gh.env.get("GITHUB_TOKEN").map(String::as_str), Some("t"));
        assert_eq!(gh.timeout_seconds, 10);
        assert!(gh.blocked_tools.contains("delete_repository"));
        assert!(gh.overwrite);
    }

    #[test]
    fn rejects_unknown_fields() {
        let file =
            write_config(r#"{"mcpServers": {"fs": {"command": "mcp-fs", "bogus": true}}}"#);
        let err = load_servers_config(file.path()).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::ConfigError);
    }

    #[test]
    fn rejects_empty_command() {
        let file = write_config(r#"{"mcpServers": {"fs": {"command": "  "}}}"#);
        assert!(load_servers_config(file.path()).is_err());
    }

    #[test]
    fn active_servers_skips_ignored() {
        let file = write_config(
            r#"{"mcpServers": {
                "a": {"command": "a"},
                "b": {"command": "b", "ignore": true}
            }}"#,
        );
        let config = load_servers_config(file.path()).unwrap();
        let active = config.active_servers();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "a");
    }
}

use router_protocol::{Result, RouterError};
use serde::Deserialize;

pub const ROUTER_TOOL_NAME: &str = "semantic_router";

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 50;

/// The operation envelope carried in the meta-tool's arguments.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    SearchTools {
        query: String,
        top_k: Option<usize>,
        server_filter: Option<String>,
        /// Expand the query through the describer before embedding.
        #[serde(default)]
        expand_query: bool,
    },
    GetServerInfo {
        server_name: String,
    },
    ListServerTools {
        server_name: String,
    },
    GetToolDetails {
        server_name: String,
        tool_name: String,
    },
    ManageServer {
        server_name: String,
        action: ManageAction,
    },
    ListRunningServers,
    ExecuteTool {
        server_name: String,
        tool_name: String,
        #[serde(default)]
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
        #[serde(default)]
        in_background: bool,
        #[serde(default)]
        priority: i32,
    },
    PollTaskResult {
        task_id: String,
    },
    GetContent {
        ref_id: String,
        #[serde(default)]
        chunk_index: usize,
    },
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManageAction {
    Start,
    Shutdown,
}

impl Operation {
    /// Parse the tool-call arguments into an operation envelope.
    pub fn parse(arguments: Option<serde_json::Map<String, serde_json::Value>>) -> Result<Self> {
        let map = arguments
            .ok_or_else(|| RouterError::invalid_argument("missing arguments: 'operation' is required"))?;
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| RouterError::invalid_argument(format!("invalid operation envelope: {e}")))
    }
}

/// Input schema of the outward tool: one required `operation` string plus
/// an open object of per-operation fields. Kept deliberately loose so the
/// static schema stays small; per-operation validation happens on parse.
pub fn router_input_schema() -> serde_json::Map<String, serde_json::Value> {
    serde_json::json!({
        "type": "object",
        "properties": {
            "operation": {
                "type": "string",
                "description": "One of the semantic_router operations",
                "enum": [
                    "search_tools",
                    "get_server_info",
                    "list_server_tools",
                    "get_tool_details",
                    "manage_server",
                    "list_running_servers",
                    "execute_tool",
                    "poll_task_result",
                    "get_content"
                ]
            }
        },
        "required": ["operation"],
        "additionalProperties": true
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
        json.as_object().cloned()
    }

    #[test]
    fn parses_search_tools_with_defaults() {
        let op = Operation::parse(args(serde_json::json!({
            "operation": "search_tools",
            "query": "open a text file"
        })))
        .unwrap();
        assert_eq!(
            op,
            Operation::SearchTools {
                query: "open a text file".into(),
                top_k: None,
                server_filter: None,
                expand_query: false,
            }
        );
    }

    #[test]
    fn parses_execute_tool_with_arguments() {
        let op = Operation::parse(args(serde_json::json!({
            "operation": "execute_tool",
            "server_name": "fs",
            "tool_name": "read_file",
            "arguments": {"path": "/tmp/x.txt"},
            "in_background": true,
            "priority": 5
        })))
        .unwrap();
        match op {
            Operation::ExecuteTool {
                server_name,
                tool_name,
                arguments,
                in_background,
                priority,
            } => {
                assert_eq!(server_name, "fs");
                assert_eq!(tool_name, "read_file");
                assert_eq!(
                    arguments.unwrap().get("path"),
                    Some(&serde_json::json!("/tmp/x.txt"))
                );
                assert!(in_background);
                assert_eq!(priority, 5);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn unknown_operation_is_invalid_argument() {
        let err = Operation::parse(args(serde_json::json!({"operation": "frobnicate"}))).unwrap_err();
        assert_eq!(err.kind, router_protocol::ErrorKind::InvalidArgument);

        let err = Operation::parse(None).unwrap_err();
        assert_eq!(err.kind, router_protocol::ErrorKind::InvalidArgument);
    }

    #[test]
    fn manage_server_actions_parse() {
        let op = Operation::parse(args(serde_json::json!({
            "operation": "manage_server",
            "server_name": "fs",
            "action": "shutdown"
        })))
        .unwrap();
        assert_eq!(
            op,
            Operation::ManageServer {
                server_name: "fs".into(),
                action: ManageAction::Shutdown,
            }
        );
    }

    #[test]
    fn schema_requires_operation_but_stays_open() {
        let schema = router_input_schema();
        assert_eq!(schema["required"], serde_json::json!(["operation"]));
        assert_eq!(schema["additionalProperties"], serde_json::json!(true));
    }
}

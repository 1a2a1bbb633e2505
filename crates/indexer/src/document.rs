use router_protocol::{ServerConfig, ToolSpec};

/// Build the raw description document for one tool: server context, hints,
/// the upstream description, and a parameter-by-parameter summary derived
/// from the input schema. This is what the describer polishes and what the
/// embedder falls back to when the describer is unavailable.
pub fn description_document(config: &ServerConfig, tool: &ToolSpec) -> String {
    let mut doc = String::new();
    doc.push_str(&format!("server: {}\n", config.name));
    if !config.hints.is_empty() {
        doc.push_str(&format!("server hints: {}\n", config.hints.join("; ")));
    }
    doc.push_str(&format!("tool: {}\n", tool.name));
    if !tool.description.trim().is_empty() {
        doc.push_str(tool.description.trim());
        doc.push('\n');
    }

    let params = parameter_lines(&tool.input_schema);
    if !params.is_empty() {
        doc.push_str("parameters:\n");
        for line in params {
            doc.push_str(&format!("- {line}\n"));
        }
    }
    doc
}

fn parameter_lines(schema: &serde_json::Value) -> Vec<String> {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Vec::new();
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, spec)| {
            let kind = spec.get("type").and_then(|t| t.as_str()).unwrap_or("any");
            let description = spec
                .get("description")
                .and_then(|d| d.as_str())
                .unwrap_or("")
                .trim();
            let requiredness = if required.contains(&name.as_str()) {
                "required"
            } else {
                "optional"
            };
            if description.is_empty() {
                format!("{name} ({kind}, {requiredness})")
            } else {
                format!("{name} ({kind}, {requiredness}): {description}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn config_with_hints(hints: &[&str]) -> ServerConfig {
        ServerConfig {
            name: "fs".into(),
            command: "mcp-fs".into(),
            args: vec![],
            env: BTreeMap::new(),
            timeout_seconds: 30,
            hints: hints.iter().map(|h| h.to_string()).collect(),
            blocked_tools: BTreeSet::new(),
            ignore: false,
            overwrite: false,
        }
    }

    #[test]
    fn document_covers_server_hints_tool_and_parameters() {
        let config = config_with_hints(&["local files", "fast reads"]);
        let tool = ToolSpec {
            name: "read_file".into(),
            description: "Read a file from disk".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "absolute path"},
                    "limit": {"type": "integer"}
                },
                "required": ["path"]
            }),
        };

        let doc = description_document(&config, &tool);
        assert!(doc.contains("server: fs"));
        assert!(doc.contains("server hints: local files; fast reads"));
        assert!(doc.contains("tool: read_file"));
        assert!(doc.contains("Read a file from disk"));
        assert!(doc.contains("path (string, required): absolute path"));
        assert!(doc.contains("limit (integer, optional)"));
    }

    #[test]
    fn document_handles_schemaless_tools() {
        let config = config_with_hints(&[]);
        let tool = ToolSpec {
            name: "ping".into(),
            description: String::new(),
            input_schema: serde_json::json!({}),
        };
        let doc = description_document(&config, &tool);
        assert!(doc.contains("tool: ping"));
        assert!(!doc.contains("parameters:"));
        assert!(!doc.contains("server hints:"));
    }
}

/// Per-server indexing outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Tools indexed and stale records removed.
    Indexed { tools: usize, stale_removed: usize },
    /// Records already present; neither `overwrite` nor `force` was set.
    Skipped,
    /// The server could not be indexed at all.
    Failed { reason: String },
}

/// What `index()` hands back to the CLI.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub outcomes: Vec<(String, IndexOutcome)>,
    /// Tools skipped inside otherwise-successful servers, with reasons.
    pub tool_failures: Vec<(String, String, String)>,
}

impl IndexReport {
    pub fn record(&mut self, server: &str, outcome: IndexOutcome) {
        self.outcomes.push((server.to_string(), outcome));
    }

    pub fn record_tool_failure(&mut self, server: &str, tool: &str, reason: String) {
        self.tool_failures
            .push((server.to_string(), tool.to_string(), reason));
    }

    pub fn indexed_tools(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                IndexOutcome::Indexed { tools, .. } => *tools,
                _ => 0,
            })
            .sum()
    }

    /// True when any server failed outright or any tool was skipped.
    pub fn has_failures(&self) -> bool {
        !self.tool_failures.is_empty()
            || self
                .outcomes
                .iter()
                .any(|(_, outcome)| matches!(outcome, IndexOutcome::Failed { .. }))
    }
}

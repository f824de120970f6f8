//! Outcome reporting for `initialize` / `refresh_all`.

/// A server that could not be connected or re-listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    pub server: String,
    pub reason: String,
}

/// Aggregate result of a discovery pass. Failures are reported here rather
/// than raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Servers attempted
    pub total: usize,
    /// Servers connected with a fresh catalog
    pub connected: usize,
    /// Servers left disconnected
    pub failed: usize,
    /// Tools discovered across connected servers
    pub total_tools: usize,
    pub failures: Vec<ServerFailure>,
}

#[derive(Debug, Clone)]
pub(crate) enum ServerOutcome {
    Connected { tools: usize },
    Failed { server: String, reason: String },
}

impl DiscoverySummary {
    pub(crate) fn from_outcomes(outcomes: Vec<ServerOutcome>) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome {
                ServerOutcome::Connected { tools } => {
                    summary.connected += 1;
                    summary.total_tools += tools;
                }
                ServerOutcome::Failed { server, reason } => {
                    summary.failed += 1;
                    summary.failures.push(ServerFailure { server, reason });
                }
            }
        }
        summary
    }

    pub fn has_connected_servers(&self) -> bool {
        self.connected > 0
    }
}

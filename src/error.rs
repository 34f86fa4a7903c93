use serde::Serialize;

/// Error taxonomy for the orchestration core.
///
/// Planning errors (`CyclicDependency`, `MissingDependency`) abort an entire
/// `execute_all` call before any engine runs. Everything else is scoped to a
/// single engine and never takes down a batch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OrchestratorError {
    #[error("cyclic dependency detected among engines: {}", engines.join(", "))]
    CyclicDependency { engines: Vec<String> },

    #[error("engine '{engine}' depends on '{dependency}', which is not registered")]
    MissingDependency { engine: String, dependency: String },

    #[error("circuit breaker is open for engine '{engine}'")]
    CircuitOpen { engine: String },

    #[error("engine not found: {engine}")]
    NotFound { engine: String },

    #[error("engine '{engine}' failed: {message}")]
    ExecutionFailed { engine: String, message: String },

    #[error("engine '{engine}' timed out after {timeout_ms}ms")]
    Timeout { engine: String, timeout_ms: u64 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Whether this error aborts a whole `execute_all` call rather than a
    /// single engine.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::CyclicDependency { .. }
                | OrchestratorError::MissingDependency { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_errors_are_flagged() {
        let cycle = OrchestratorError::CyclicDependency {
            engines: vec!["a".to_string(), "b".to_string()],
        };
        assert!(cycle.is_planning_error());

        let open = OrchestratorError::CircuitOpen {
            engine: "a".to_string(),
        };
        assert!(!open.is_planning_error());
    }

    #[test]
    fn cycle_message_names_engines() {
        let err = OrchestratorError::CyclicDependency {
            engines: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected among engines: a, b, c"
        );
    }
}

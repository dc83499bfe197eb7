//! The seam through which generated scripts are run in the host.

use std::fmt;

use async_trait::async_trait;

use crate::dialect::ScriptDialect;

/// The result of running a script.
pub type ExecutionResult = Result<(), ExecutionFailure>;

/// Describes why a script failed, as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionFailure {
    /// The error class, e.g. `NameError`.
    pub kind: String,
    /// The offending source line, if known.
    pub line: String,
    /// The human-readable error message.
    pub message: String,
}

impl ExecutionFailure {
    /// Creates a failure from its parts.
    pub fn new(
        kind: impl Into<String>,
        line: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            line: line.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.kind, self.line, self.message)
    }
}

impl std::error::Error for ExecutionFailure {}

/// Runs scripts inside the host application.
///
/// Failures are returned as values; implementations must not panic on bad
/// scripts.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    /// Runs `code` written in `dialect`.
    async fn execute(
        &self,
        code: &str,
        dialect: ScriptDialect,
    ) -> ExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let failure = ExecutionFailure::new(
            "SyntaxError",
            "cmds.polyCube(",
            "unexpected EOF while parsing",
        );
        assert_eq!(
            failure.to_string(),
            "SyntaxError: cmds.polyCube(: unexpected EOF while parsing"
        );
    }
}

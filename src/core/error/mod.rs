use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification used by the scheduler and notifier to decide retry vs fatal handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A transient I/O failure: network blip, file lock contention, flaky external service.
    TransientIo,
    /// The task exceeded its per-attempt timeout.
    Timeout,
    /// Input or output validation failed; retrying would not help.
    Validation,
    /// A dependency failed or was never satisfied.
    Dependency,
    /// The task was cancelled cooperatively.
    Cancelled,
    /// An unexpected internal error.
    Internal,
}

impl ErrorKind {
    /// Whether a failure of this kind should be retried under the task's backoff policy.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::TransientIo | ErrorKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured application error carried through the orchestrator, scheduler, and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub context: Option<String>,
}

impl AppError {
    pub fn new<T: Into<String>>(kind: ErrorKind, message: T) -> Self {
        AppError {
            kind,
            code: default_code(kind),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn validation<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorKind::Validation, message)
    }

    pub fn internal<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorKind::Internal, message)
    }

    pub fn cancelled<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorKind::Cancelled, message)
    }
}

fn default_code(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::TransientIo => "PIPE-IO-001",
        ErrorKind::Timeout => "PIPE-TIMEOUT-001",
        ErrorKind::Validation => "PIPE-VALIDATION-001",
        ErrorKind::Dependency => "PIPE-DEP-001",
        ErrorKind::Cancelled => "PIPE-CANCEL-001",
        ErrorKind::Internal => "PIPE-INTERNAL-001",
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.kind, self.message)?;
        if let Some(ref context) = self.context {
            write!(f, " (context: {})", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::new(ErrorKind::TransientIo, err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::new(ErrorKind::Internal, err.to_string()).with_code("PIPE-SERDE-001")
    }
}

impl From<AppError> for anyhow::Error {
    fn from(err: AppError) -> Self {
        anyhow::anyhow!(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_are_transient_io_and_timeout() {
        assert!(ErrorKind::TransientIo.retryable());
        assert!(ErrorKind::Timeout.retryable());
        assert!(!ErrorKind::Validation.retryable());
        assert!(!ErrorKind::Dependency.retryable());
        assert!(!ErrorKind::Cancelled.retryable());
        assert!(!ErrorKind::Internal.retryable());
    }

    #[test]
    fn test_error_creation() {
        let error = AppError::new(ErrorKind::Validation, "test error");
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.message, "test error");
    }

    #[test]
    fn test_error_with_context() {
        let error = AppError::new(ErrorKind::Internal, "tool failed").with_context("iteration 5");
        assert_eq!(error.context, Some("iteration 5".to_string()));
    }

    #[test]
    fn test_error_with_code() {
        let error = AppError::new(ErrorKind::Internal, "system error").with_code("TEST-001");
        assert_eq!(error.code, "TEST-001");
    }

    #[test]
    fn display_includes_code_kind_and_context() {
        let rendered = AppError::validation("bad input")
            .with_code("PIPE-VALIDATION-007")
            .with_context("loading state")
            .to_string();
        assert!(rendered.contains("PIPE-VALIDATION-007"));
        assert!(rendered.contains("validation"));
        assert!(rendered.contains("loading state"));
    }
}

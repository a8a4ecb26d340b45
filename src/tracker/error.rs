use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackerErrorCode {
    MissingRuntime,
    AccessorFailed,
    UnexpectedValue,
    RequestDropped,
    Timeout,
    InvalidArgument,
    Internal,
}

impl TrackerErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerErrorCode::MissingRuntime => "tracker/missing-runtime",
            TrackerErrorCode::AccessorFailed => "tracker/accessor-failed",
            TrackerErrorCode::UnexpectedValue => "tracker/unexpected-value",
            TrackerErrorCode::RequestDropped => "tracker/request-dropped",
            TrackerErrorCode::Timeout => "tracker/timeout",
            TrackerErrorCode::InvalidArgument => "tracker/invalid-argument",
            TrackerErrorCode::Internal => "tracker/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrackerError {
    pub code: TrackerErrorCode,
    message: String,
}

impl TrackerError {
    pub fn new(code: TrackerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for TrackerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for TrackerError {}

pub type TrackerResult<T> = Result<T, TrackerError>;

pub fn missing_runtime(queue_name: &str) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::MissingRuntime,
        format!("Matomo command queue `{queue_name}` is not defined"),
    )
}

pub fn accessor_failed(accessor: &str, reason: impl Display) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::AccessorFailed,
        format!("`{accessor}` failed: {reason}"),
    )
}

pub fn unexpected_value(accessor: &str, reason: impl Display) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::UnexpectedValue,
        format!("`{accessor}` returned an unexpected value: {reason}"),
    )
}

pub fn request_dropped(accessor: &str) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::RequestDropped,
        format!("`{accessor}` was discarded before the tracker ran it"),
    )
}

pub fn timeout(accessor: &str) -> TrackerError {
    TrackerError::new(
        TrackerErrorCode::Timeout,
        format!("`{accessor}` did not complete in time"),
    )
}

pub fn invalid_argument(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> TrackerError {
    TrackerError::new(TrackerErrorCode::Internal, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = missing_runtime("_paq");
        assert_eq!(
            err.to_string(),
            "Matomo command queue `_paq` is not defined (tracker/missing-runtime)"
        );
        assert_eq!(err.code, TrackerErrorCode::MissingRuntime);
    }
}

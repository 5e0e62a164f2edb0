use thiserror::Error;

/// Which frame an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRole {
    Training,
    Future,
}

impl std::fmt::Display for FrameRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRole::Training => write!(f, "training"),
            FrameRole::Future => write!(f, "future"),
        }
    }
}

/// Errors raised by `DataFrame` accessors and builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {name} has type {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Column {name} has {found} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Broad classification used by callers to decide whether a failure is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown method tag or malformed params.
    Configuration,
    /// Data or statistical failure while fitting or applying fitted state.
    Fit,
    /// Lifecycle misuse, e.g. predicting before fitting.
    Usage,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UncertaintyError {
    #[error("Unknown uncertainty method '{method}' (known: {known})")]
    UnknownMethod { method: String, known: String },

    #[error("Invalid uncertainty param '{param}': {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("Invalid uncertainty configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("The {0} frame is empty")]
    EmptyFrame(FrameRole),

    #[error("Insufficient samples for {context}: need {needed}, found {found}")]
    InsufficientSamples {
        context: String,
        needed: usize,
        found: usize,
    },

    #[error("Degenerate variance: {0}")]
    DegenerateVariance(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Uncertainty model has not been fitted; call fit before predict")]
    NotFitted,
}

impl UncertaintyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UncertaintyError::UnknownMethod { .. }
            | UncertaintyError::InvalidParam { .. }
            | UncertaintyError::InvalidConfig(_) => ErrorKind::Configuration,
            UncertaintyError::Frame(_)
            | UncertaintyError::EmptyFrame(_)
            | UncertaintyError::InsufficientSamples { .. }
            | UncertaintyError::DegenerateVariance(_)
            | UncertaintyError::Numerical(_) => ErrorKind::Fit,
            UncertaintyError::NotFitted => ErrorKind::Usage,
        }
    }

    /// Configuration and fit failures only cost the interval estimate; the
    /// enclosing forecast can continue without it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Usage)
    }

    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        UncertaintyError::InvalidParam {
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UncertaintyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let unknown = UncertaintyError::UnknownMethod {
            method: "bogus".to_string(),
            known: "a, b".to_string(),
        };
        assert_eq!(unknown.kind(), ErrorKind::Configuration);
        assert!(unknown.is_recoverable());

        let missing: UncertaintyError = FrameError::MissingColumn("y".to_string()).into();
        assert_eq!(missing.kind(), ErrorKind::Fit);
        assert!(missing.is_recoverable());

        assert_eq!(UncertaintyError::NotFitted.kind(), ErrorKind::Usage);
        assert!(!UncertaintyError::NotFitted.is_recoverable());
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = UncertaintyError::from(FrameError::MissingColumn("forecast".to_string()));
        assert!(err.to_string().contains("forecast"));

        let err = UncertaintyError::EmptyFrame(FrameRole::Training);
        assert_eq!(err.to_string(), "The training frame is empty");
    }
}

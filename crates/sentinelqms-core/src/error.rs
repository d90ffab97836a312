use thiserror::Error;

pub type SentinelResult<T> = Result<T, SentinelError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SentinelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed external record, identified by position only. The offending
    /// record is never echoed by name or path.
    #[error("malformed record at position {position}: {reason}")]
    MalformedRecord { position: usize, reason: String },

    /// A pipeline invariant did not hold. This indicates a bug in the
    /// engine itself, not a property of the evidence; the run must abort.
    #[error("invariant violated [{code}]: {message}")]
    InvariantViolation { code: &'static str, message: String },
}

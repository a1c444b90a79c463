use thiserror::Error;

/// Returned when a bit stream ends early or holds a value that cannot be
/// decoded into the requested type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Failed to read from bit stream: data is truncated or malformed")]
pub struct SerdeErr;

/// Error type for this crate.
///
/// Only configuration can fail. Guard operations are total.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptGuardError {
    /// Invalid maximum attempt count.
    #[error("invalid max attempts: {0}")]
    InvalidMaxAttempts(String),
    /// Invalid window length.
    #[error("invalid window: {0}")]
    InvalidWindowMs(String),
    /// Invalid cooldown length.
    #[error("invalid cooldown: {0}")]
    InvalidCooldownMs(String),
}

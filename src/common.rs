use std::ops::Deref;

use crate::AttemptGuardError;

/// Maximum number of attempts admitted inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MaxAttempts(u32);

impl Default for MaxAttempts {
    /// Returns 5 attempts.
    fn default() -> Self {
        Self(5)
    }
}

impl Deref for MaxAttempts {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u32> for MaxAttempts {
    type Error = AttemptGuardError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(AttemptGuardError::InvalidMaxAttempts(
                "Max attempts must be at least 1".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Length of the rolling window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowMs(u64);

impl Default for WindowMs {
    /// Returns 15 minutes.
    fn default() -> Self {
        Self(15 * 60 * 1000)
    }
}

impl Deref for WindowMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowMs {
    type Error = AttemptGuardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(AttemptGuardError::InvalidWindowMs(
                "Window must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Length of the cooldown imposed once the quota is exhausted, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CooldownMs(u64);

impl Default for CooldownMs {
    /// Returns 30 minutes.
    fn default() -> Self {
        Self(30 * 60 * 1000)
    }
}

impl Deref for CooldownMs {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for CooldownMs {
    type Error = AttemptGuardError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(AttemptGuardError::InvalidCooldownMs(
                "Cooldown must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Snapshot of the attempts tracked for one identifier.
///
/// Timestamps are milliseconds read from the guard's [`Clock`](crate::Clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Attempts recorded in the current window. Always at least 1.
    pub count: u32,
    /// Timestamp of the first attempt in the current window.
    pub window_start: u64,
    /// Timestamp of the most recent recorded attempt.
    pub last_attempt: u64,
}

impl AttemptRecord {
    pub(crate) fn new(now: u64) -> Self {
        Self {
            count: 1,
            window_start: now,
            last_attempt: now,
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// The attempt is allowed.
    Allowed,
    /// The attempt is rejected because the identifier is cooling down.
    ///
    /// The hints are advisory. The guard never blocks the caller.
    Rejected {
        /// Milliseconds until the cooldown lapses.
        retry_after_ms: u64,
        /// Attempts recorded in the window that triggered the cooldown.
        attempts: u32,
    },
}

impl AttemptDecision {
    /// Whether the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, AttemptDecision::Allowed)
    }

    /// Milliseconds the caller should wait before retrying. `0` when allowed.
    pub fn wait_time_ms(&self) -> u64 {
        match self {
            AttemptDecision::Allowed => 0,
            AttemptDecision::Rejected { retry_after_ms, .. } => *retry_after_ms,
        }
    }
}

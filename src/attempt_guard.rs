use std::sync::Mutex;

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Clock, SystemClock,
    cleanup_loop::CleanupLoopHandle,
    common::{AttemptDecision, AttemptRecord, CooldownMs, MaxAttempts, WindowMs},
};

/// Configuration for [`AttemptGuard`].
///
/// The defaults are 5 attempts per 15 minute window and a 30 minute cooldown.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttemptGuardOptions {
    /// Attempts admitted inside one window before the cooldown kicks in.
    pub max_attempts: MaxAttempts,
    /// Rolling window over which attempts are counted.
    pub window_ms: WindowMs,
    /// Cooldown imposed once `max_attempts` is reached, measured from the last
    /// recorded attempt.
    pub cooldown_ms: CooldownMs,
}

/// What a check does to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Reject { retry_after_ms: u64, attempts: u32 },
    Renew(Renewal),
    Increment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renewal {
    CooldownLapsed,
    WindowExpired,
}

/// Per-identifier attempt throttle with a rolling window and a cooldown.
///
/// Tracks one [`AttemptRecord`] per identifier (an email, an IP address, any
/// opaque string). Up to `max_attempts` attempts are admitted inside a window;
/// once the quota is used up the identifier is rejected until `cooldown_ms`
/// has passed since its last recorded attempt.
///
/// # Algorithm
///
/// For `check_and_record(identifier)` at time `now`:
///
/// 1. **Unknown identifier:** open a window (`count = 1`) and allow
/// 2. **Window expired** (`now - window_start > window_ms`): open a fresh
///    window and allow
/// 3. **Quota exhausted inside the window:** reject with
///    `cooldown_ms - (now - last_attempt)` if that is positive, otherwise open a
///    fresh window and allow
/// 4. **Otherwise:** increment `count`, move `last_attempt` to `now`, allow
///
/// Rejected calls do not touch the record, so the cooldown expires at a fixed
/// time no matter how often the caller retries. The window expiring also lifts
/// a cooldown, so with a cooldown longer than the window `retry_after_ms` is an
/// upper bound.
///
/// # Thread Safety
///
/// - Records live in a [`DashMap`](dashmap::DashMap)
/// - Each check runs entirely under the identifier's entry lock, so concurrent
///   checks for one identifier are serialized and never overshoot the quota
/// - Distinct identifiers proceed in parallel
///
/// # Memory
///
/// Records stay until [`reset`](Self::reset), [`cleanup`](Self::cleanup) or the
/// cleanup loop removes them. Use [`run_cleanup_loop`](Self::run_cleanup_loop)
/// when identifier cardinality is unbounded.
///
/// # Examples
///
/// ```
/// use attempt_guard::{AttemptGuard, AttemptGuardOptions};
///
/// let guard = AttemptGuard::new(AttemptGuardOptions::default());
///
/// for _ in 0..5 {
///     assert!(guard.check_and_record("a@test.com").is_allowed());
/// }
///
/// let decision = guard.check_and_record("a@test.com");
/// assert!(!decision.is_allowed());
/// assert!(decision.wait_time_ms() > 0);
///
/// // Successful login clears the penalty.
/// guard.reset("a@test.com");
/// assert!(guard.check_and_record("a@test.com").is_allowed());
/// ```
pub struct AttemptGuard<C: Clock = SystemClock> {
    max_attempts: MaxAttempts,
    window_ms: WindowMs,
    cooldown_ms: CooldownMs,
    clock: C,
    records: DashMap<String, AttemptRecord>,
    pub(crate) cleanup_loop: Mutex<Option<CleanupLoopHandle>>,
}

impl AttemptGuard<SystemClock> {
    /// Create a guard reading time from a fresh [`SystemClock`].
    pub fn new(options: AttemptGuardOptions) -> Self {
        Self::with_clock(options, SystemClock::new())
    }
}

impl<C: Clock> AttemptGuard<C> {
    /// Create a guard reading time from `clock`.
    pub fn with_clock(options: AttemptGuardOptions, clock: C) -> Self {
        Self {
            max_attempts: options.max_attempts,
            window_ms: options.window_ms,
            cooldown_ms: options.cooldown_ms,
            clock,
            records: DashMap::new(),
            cleanup_loop: Mutex::new(None),
        }
    } // end method with_clock

    /// Options this guard was built with.
    pub fn options(&self) -> AttemptGuardOptions {
        AttemptGuardOptions {
            max_attempts: self.max_attempts,
            window_ms: self.window_ms,
            cooldown_ms: self.cooldown_ms,
        }
    }

    /// Check whether an attempt for `identifier` may proceed and, if so, record it.
    ///
    /// Call this before verifying credentials. A rejected attempt is not
    /// recorded.
    ///
    /// # Returns
    ///
    /// - [`AttemptDecision::Allowed`]: attempt admitted and counted
    /// - [`AttemptDecision::Rejected`]: identifier is cooling down;
    ///   `retry_after_ms` is the remaining cooldown
    ///
    /// # Examples
    ///
    /// ```
    /// use attempt_guard::{AttemptDecision, AttemptGuard, AttemptGuardOptions};
    ///
    /// let guard = AttemptGuard::new(AttemptGuardOptions::default());
    ///
    /// match guard.check_and_record("10.0.0.7") {
    ///     AttemptDecision::Allowed => { /* verify credentials */ }
    ///     AttemptDecision::Rejected { retry_after_ms, .. } => {
    ///         println!("try again in {} minutes", retry_after_ms.div_ceil(60_000));
    ///     }
    /// }
    /// ```
    pub fn check_and_record(&self, identifier: &str) -> AttemptDecision {
        let now = self.clock.now_ms();

        let mut record = match self.records.get_mut(identifier) {
            Some(record) => record,
            None => match self.records.entry(identifier.to_string()) {
                Entry::Occupied(entry) => entry.into_ref(),
                Entry::Vacant(entry) => {
                    entry.insert(AttemptRecord::new(now));
                    tracing::debug!(identifier, "attempt window opened");
                    return AttemptDecision::Allowed;
                }
            },
        };

        match self.step(&record, now) {
            Step::Reject {
                retry_after_ms,
                attempts,
            } => {
                tracing::warn!(
                    identifier,
                    attempts,
                    retry_after_ms,
                    "attempt rejected, identifier is cooling down"
                );
                AttemptDecision::Rejected {
                    retry_after_ms,
                    attempts,
                }
            }
            Step::Renew(reason) => {
                *record = AttemptRecord::new(now);
                tracing::debug!(identifier, ?reason, "attempt window renewed");
                AttemptDecision::Allowed
            }
            Step::Increment => {
                record.count = record.count.saturating_add(1);
                record.last_attempt = record.last_attempt.max(now);
                AttemptDecision::Allowed
            }
        }
    } // end method check_and_record

    /// Check whether an attempt for `identifier` would be allowed, without
    /// recording anything.
    ///
    /// Unknown identifiers are allowed.
    pub fn is_allowed(&self, identifier: &str) -> AttemptDecision {
        let Some(record) = self.records.get(identifier) else {
            return AttemptDecision::Allowed;
        };

        match self.step(&record, self.clock.now_ms()) {
            Step::Reject {
                retry_after_ms,
                attempts,
            } => AttemptDecision::Rejected {
                retry_after_ms,
                attempts,
            },
            Step::Renew(_) | Step::Increment => AttemptDecision::Allowed,
        }
    } // end method is_allowed

    /// Forget `identifier`, so its next attempt opens a fresh window.
    ///
    /// Call this after a successful authentication. Does nothing for unknown
    /// identifiers.
    pub fn reset(&self, identifier: &str) {
        if self.records.remove(identifier).is_some() {
            tracing::debug!(identifier, "attempt record reset");
        }
    }

    /// Snapshot of the record tracked for `identifier`.
    pub fn record(&self, identifier: &str) -> Option<AttemptRecord> {
        self.records.get(identifier).map(|record| *record)
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no identifier is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove every record that can no longer influence a decision.
    ///
    /// A record is dropped once its window has expired, or once its quota was
    /// exhausted and its cooldown has lapsed. The next attempt for such an
    /// identifier would open a fresh window anyway.
    pub fn cleanup(&self) {
        let now = self.clock.now_ms();
        let before = self.records.len();

        self.records
            .retain(|_, record| !matches!(self.step(record, now), Step::Renew(_)));

        tracing::trace!(evicted = before.saturating_sub(self.records.len()), "cleanup pass");
    } // end method cleanup

    /// Remove records whose last attempt is more than `stale_after_ms` old.
    pub(crate) fn cleanup_stale(&self, stale_after_ms: u64) {
        let now = self.clock.now_ms();
        let before = self.records.len();

        self.records
            .retain(|_, record| now.saturating_sub(record.last_attempt) <= stale_after_ms);

        tracing::trace!(
            evicted = before.saturating_sub(self.records.len()),
            stale_after_ms,
            "stale cleanup pass"
        );
    } // end method cleanup_stale

    /// Age after which a record can no longer influence a decision.
    ///
    /// `window_start <= last_attempt`, so a record whose last attempt is older
    /// than the window has an expired window.
    pub(crate) fn default_stale_after_ms(&self) -> u64 {
        *self.window_ms
    }

    fn step(&self, record: &AttemptRecord, now: u64) -> Step {
        if now.saturating_sub(record.window_start) > *self.window_ms {
            return Step::Renew(Renewal::WindowExpired);
        }

        if record.count >= *self.max_attempts {
            let since_last = now.saturating_sub(record.last_attempt);
            let retry_after_ms = self.cooldown_ms.saturating_sub(since_last);

            return if retry_after_ms > 0 {
                Step::Reject {
                    retry_after_ms,
                    attempts: record.count,
                }
            } else {
                Step::Renew(Renewal::CooldownLapsed)
            };
        }

        Step::Increment
    } // end method step
}

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod attempt_guard;
pub use attempt_guard::*;

mod cleanup_loop;
pub use cleanup_loop::*;

mod clock;
pub use clock::*;

mod error;
pub use error::*;

mod common;
pub use common::{AttemptDecision, AttemptRecord, CooldownMs, MaxAttempts, WindowMs};

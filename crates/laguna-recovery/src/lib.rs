//! Failure containment for the render path.
//!
//! Every fallible render operation goes through an
//! [`ErrorRecoveryCoordinator`]: errors are logged with their entity kind and
//! id, an optional fallback is tried, and ids that could not be rendered at
//! all are parked in a failure set that is retried on a fixed interval.
//! Nothing in the render path propagates an error to its caller.

mod coordinator;
mod error;

pub use coordinator::{
    DEFAULT_RECOVERY_INTERVAL, ErrorRecoveryCoordinator, Outcome, RecoveryReport, RecoveryStats,
};
pub use error::RenderError;

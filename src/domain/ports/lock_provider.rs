//! LockProvider port - cluster-wide named locks with a TTL
//!
//! The provider only grants, extends and releases. Renewal scheduling and
//! liveness bookkeeping live in `crate::lease`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::value_objects::{LockName, LockToken};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock service could not be reached
    #[error("lock service unavailable: {0}")]
    Unavailable(String),

    /// The lock record could not be read or written
    #[error("lock storage error: {0}")]
    Storage(String),
}

/// Holder-side liveness hooks the provider may call
pub trait LivenessCallback: Send + Sync {
    /// Whether the holder still considers itself live
    fn is_active(&self) -> bool;

    /// Exclusivity can no longer be guaranteed
    fn on_lost(&self);
}

pub trait LockProvider: Send + Sync {
    /// Grant `name` for `ttl` if it is free or expired
    fn try_acquire(&self, name: &LockName, ttl: Duration) -> Result<Option<LockToken>, LockError>;

    /// Extend a held lock. `Ok(false)` means the token no longer holds it.
    fn refresh(&self, name: &LockName, token: &LockToken, ttl: Duration)
        -> Result<bool, LockError>;

    /// Release a held lock. Releasing a lock no longer held is not an error.
    fn release(&self, name: &LockName, token: &LockToken) -> Result<(), LockError>;

    /// Register for loss notifications on a held lock
    fn watch(&self, _name: &LockName, _token: &LockToken, _callback: Arc<dyn LivenessCallback>) {}
}

//! In-memory lock provider

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::domain::ports::{Clock, LivenessCallback, LockError, LockProvider, SystemClock};
use crate::domain::value_objects::{LockName, LockToken};

struct Grant {
    token: LockToken,
    expires_at_ms: u64,
    watchers: Vec<Arc<dyn LivenessCallback>>,
}

struct Table {
    clock: Arc<dyn Clock>,
    grants: Mutex<HashMap<LockName, Grant>>,
    stalled: AtomicBool,
    next_token: AtomicU64,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
}

/// Lock table shared by every clone of the provider.
///
/// Expired grants can be taken over by another holder. `stall` makes
/// refreshes fail as if the holder were cut off from the lock service, and
/// `revoke` simulates failover by dropping a grant and notifying watchers.
#[derive(Clone)]
pub struct InMemoryLockProvider {
    table: Arc<Table>,
}

impl InMemoryLockProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            table: Arc::new(Table {
                clock,
                grants: Mutex::new(HashMap::new()),
                stalled: AtomicBool::new(false),
                next_token: AtomicU64::new(1),
                acquisitions: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    fn grants(&self) -> MutexGuard<'_, HashMap<LockName, Grant>> {
        self.table
            .grants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every refresh fail until `resume`
    pub fn stall(&self) {
        self.table.stalled.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.table.stalled.store(false, Ordering::SeqCst);
    }

    /// Drop the grant for `name` and tell its watchers
    pub fn revoke(&self, name: &LockName) {
        let grant = self.grants().remove(name);
        if let Some(grant) = grant {
            debug!(lock = %name, "lock revoked");
            for watcher in grant.watchers {
                watcher.on_lost();
            }
        }
    }

    /// Whether `name` is currently granted and unexpired
    pub fn is_held(&self, name: &LockName) -> bool {
        let now = self.table.clock.now_ms();
        self.grants()
            .get(name)
            .is_some_and(|grant| grant.expires_at_ms > now)
    }

    pub fn acquisition_count(&self) -> usize {
        self.table.acquisitions.load(Ordering::SeqCst)
    }

    /// Number of `release` calls, held or not
    pub fn release_count(&self) -> usize {
        self.table.releases.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LockProvider for InMemoryLockProvider {
    fn try_acquire(&self, name: &LockName, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        let now = self.table.clock.now_ms();
        let mut grants = self.grants();
        let live = grants.get(name).map(|grant| grant.expires_at_ms > now);
        let displaced = match live {
            Some(true) => return Ok(None),
            Some(false) => grants.remove(name),
            None => None,
        };

        let token = LockToken::new(format!(
            "mem-{}",
            self.table.next_token.fetch_add(1, Ordering::SeqCst)
        ));
        grants.insert(
            name.clone(),
            Grant {
                token: token.clone(),
                expires_at_ms: now + ttl.as_millis() as u64,
                watchers: Vec::new(),
            },
        );
        drop(grants);
        self.table.acquisitions.fetch_add(1, Ordering::SeqCst);

        if let Some(expired) = displaced {
            for watcher in expired.watchers {
                watcher.on_lost();
            }
        }
        Ok(Some(token))
    }

    fn refresh(&self, name: &LockName, token: &LockToken, ttl: Duration) -> Result<bool, LockError> {
        if self.table.stalled.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("lock service stalled".to_string()));
        }
        let now = self.table.clock.now_ms();
        let mut grants = self.grants();
        match grants.get_mut(name) {
            Some(grant) if &grant.token == token => {
                grant.expires_at_ms = now + ttl.as_millis() as u64;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn release(&self, name: &LockName, token: &LockToken) -> Result<(), LockError> {
        self.table.releases.fetch_add(1, Ordering::SeqCst);
        let mut grants = self.grants();
        if grants.get(name).is_some_and(|grant| &grant.token == token) {
            grants.remove(name);
        }
        Ok(())
    }

    fn watch(&self, name: &LockName, token: &LockToken, callback: Arc<dyn LivenessCallback>) {
        if let Some(grant) = self.grants().get_mut(name) {
            if &grant.token == token {
                grant.watchers.push(callback);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ManualClock;

    fn provider() -> (InMemoryLockProvider, ManualClock) {
        let clock = ManualClock::new();
        (InMemoryLockProvider::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let (locks, _) = provider();
        let name = LockName::new("dest");
        let ttl = Duration::from_millis(1000);

        assert!(locks.try_acquire(&name, ttl).unwrap().is_some());
        assert!(locks.try_acquire(&name, ttl).unwrap().is_none());
        assert!(locks.is_held(&name));
    }

    #[test]
    fn expired_grant_can_be_taken_over() {
        let (locks, clock) = provider();
        let name = LockName::new("dest");
        let ttl = Duration::from_millis(1000);

        let first = locks.try_acquire(&name, ttl).unwrap().unwrap();
        clock.advance(Duration::from_millis(1001));
        let second = locks.try_acquire(&name, ttl).unwrap().unwrap();

        assert_ne!(first, second);
        assert!(!locks.refresh(&name, &first, ttl).unwrap());
        assert!(locks.refresh(&name, &second, ttl).unwrap());
    }

    #[test]
    fn release_with_stale_token_keeps_grant() {
        let (locks, _) = provider();
        let name = LockName::new("dest");
        let ttl = Duration::from_millis(1000);

        locks.try_acquire(&name, ttl).unwrap();
        locks.release(&name, &LockToken::new("other")).unwrap();
        assert!(locks.is_held(&name));
        assert_eq!(locks.release_count(), 1);
    }

    #[test]
    fn stalled_refresh_errors() {
        let (locks, _) = provider();
        let name = LockName::new("dest");
        let ttl = Duration::from_millis(1000);
        let token = locks.try_acquire(&name, ttl).unwrap().unwrap();

        locks.stall();
        assert!(matches!(
            locks.refresh(&name, &token, ttl),
            Err(LockError::Unavailable(_))
        ));
        locks.resume();
        assert!(locks.refresh(&name, &token, ttl).unwrap());
    }
}

//! Lock lease: a renewable, cluster-wide exclusive lock on a destination
//!
//! `LockLease::acquire` takes the lock through a `LockProvider` and starts a
//! renewal thread that extends it every `refresh_interval`. The holder calls
//! `check_live` (or a cloned `LeaseProbe`) during long work; the check reads
//! only local atomics, so it is cheap enough to call per directory.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::domain::ports::{Clock, LivenessCallback, LockProvider};
use crate::domain::value_objects::{LockName, LockToken};
use crate::error::{DeployError, DeployResult};

/// Timing parameters of a lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseConfig {
    pub ttl: Duration,
    pub refresh_interval: Duration,
    pub retry_wait: Duration,
    /// Attempts before giving up; 0 is treated as 1
    pub retry_count: u32,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(30_000),
            refresh_interval: Duration::from_millis(5_000),
            retry_wait: Duration::from_millis(1_000),
            retry_count: 10,
        }
    }
}

/// State shared between the holder, the renewal thread and the provider
struct LeaseState {
    name: LockName,
    active: AtomicBool,
    last_refreshed_ms: AtomicU64,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl LeaseState {
    fn touch(&self) {
        self.last_refreshed_ms
            .store(self.clock.now_ms(), Ordering::Release);
    }

    fn elapsed_ms(&self) -> u64 {
        self.clock
            .now_ms()
            .saturating_sub(self.last_refreshed_ms.load(Ordering::Acquire))
    }

    fn check_live(&self) -> DeployResult<()> {
        if !self.active.load(Ordering::Acquire) {
            return Err(DeployError::LockExpired {
                name: self.name.to_string(),
                reason: "exclusivity lost".to_string(),
            });
        }
        let elapsed = self.elapsed_ms();
        if elapsed > self.ttl_ms {
            return Err(DeployError::LockExpired {
                name: self.name.to_string(),
                reason: format!("no refresh for {} ms (ttl {} ms)", elapsed, self.ttl_ms),
            });
        }
        Ok(())
    }
}

impl LivenessCallback for LeaseState {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn on_lost(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            warn!(lock = %self.name, "lock lease lost");
        }
    }
}

/// Cheap, clonable liveness check for threads that do not own the lease
#[derive(Clone)]
pub struct LeaseProbe {
    state: Arc<LeaseState>,
}

impl LeaseProbe {
    pub fn check_live(&self) -> DeployResult<()> {
        self.state.check_live()
    }

    pub fn name(&self) -> &LockName {
        &self.state.name
    }
}

impl std::fmt::Debug for LeaseProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseProbe")
            .field("name", &self.state.name)
            .field("active", &self.state.is_active())
            .finish()
    }
}

struct Renewal {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// A held lock. Released exactly once, by `release` or on drop.
pub struct LockLease {
    state: Arc<LeaseState>,
    token: LockToken,
    provider: Arc<dyn LockProvider>,
    renewal: Option<Renewal>,
    released: bool,
}

impl LockLease {
    /// Take the lock, retrying up to `retry_count` times `retry_wait` apart.
    pub fn acquire(
        provider: Arc<dyn LockProvider>,
        name: LockName,
        config: &LeaseConfig,
        clock: Arc<dyn Clock>,
    ) -> DeployResult<Self> {
        let attempts = config.retry_count.max(1);
        let mut token = None;
        for attempt in 1..=attempts {
            if let Some(granted) = provider.try_acquire(&name, config.ttl)? {
                token = Some(granted);
                break;
            }
            debug!(lock = %name, attempt, attempts, "lock busy");
            if attempt < attempts {
                thread::sleep(config.retry_wait);
            }
        }
        let Some(token) = token else {
            return Err(DeployError::LockTimeout {
                name: name.to_string(),
                attempts,
            });
        };

        let state = Arc::new(LeaseState {
            name,
            active: AtomicBool::new(true),
            last_refreshed_ms: AtomicU64::new(0),
            ttl_ms: config.ttl.as_millis() as u64,
            clock,
        });
        state.touch();
        provider.watch(&state.name, &token, state.clone());
        info!(lock = %state.name, "lock acquired");

        let mut lease = Self {
            state,
            token,
            provider,
            renewal: None,
            released: false,
        };
        let renewal = spawn_renewal(
            lease.state.clone(),
            lease.provider.clone(),
            lease.token.clone(),
            config.ttl,
            config.refresh_interval,
        );
        match renewal {
            Ok(renewal) => {
                lease.renewal = Some(renewal);
                Ok(lease)
            }
            Err(err) => {
                if let Err(release_err) = lease.release() {
                    warn!(error = %release_err, "failed to release lock after renewal spawn failure");
                }
                Err(err.into())
            }
        }
    }

    pub fn name(&self) -> &LockName {
        &self.state.name
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn probe(&self) -> LeaseProbe {
        LeaseProbe {
            state: self.state.clone(),
        }
    }

    /// Fails with `LockExpired` once exclusivity is no longer guaranteed
    pub fn check_live(&self) -> DeployResult<()> {
        self.state.check_live()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop renewal and give the lock back. Later calls do nothing.
    pub fn release(&mut self) -> DeployResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.state.active.store(false, Ordering::Release);

        if let Some(renewal) = self.renewal.take() {
            drop(renewal.stop);
            if renewal.handle.join().is_err() {
                warn!(lock = %self.state.name, "lease renewal thread panicked");
            }
        }

        self.provider.release(&self.state.name, &self.token)?;
        info!(lock = %self.state.name, "lock released");
        Ok(())
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(lock = %self.state.name, error = %err, "failed to release lock");
        }
    }
}

fn spawn_renewal(
    state: Arc<LeaseState>,
    provider: Arc<dyn LockProvider>,
    token: LockToken,
    ttl: Duration,
    interval: Duration,
) -> std::io::Result<Renewal> {
    let (stop, stopped) = channel::bounded::<()>(1);
    let handle = thread::Builder::new()
        .name("treeship-lease".to_string())
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
            if !state.is_active() {
                break;
            }
            match provider.refresh(&state.name, &token, ttl) {
                Ok(true) => state.touch(),
                Ok(false) => {
                    state.on_lost();
                    break;
                }
                Err(err) => {
                    warn!(lock = %state.name, error = %err, "lock refresh failed");
                    if state.elapsed_ms() > state.ttl_ms {
                        state.on_lost();
                        break;
                    }
                }
            }
        })?;
    Ok(Renewal { stop, handle })
}

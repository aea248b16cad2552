//! File lock provider
//!
//! One lease file per lock name in a shared directory. Every
//! read-modify-write of a lease file happens under an exclusive `fs2` lock
//! on a sibling guard file, so processes on hosts sharing the directory
//! see a consistent grant.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ports::{LockError, LockProvider};
use crate::domain::value_objects::{LockName, LockToken};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LeaseRecord {
    name: String,
    token: String,
    holder: u32,
    expires_at: DateTime<Utc>,
}

pub struct FileLockProvider {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FileLockProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lease_path(&self, name: &LockName) -> PathBuf {
        self.dir.join(format!("{}.lease", name.file_stem()))
    }

    fn guard_path(&self, name: &LockName) -> PathBuf {
        self.dir.join(format!("{}.lock", name.file_stem()))
    }

    /// Run `f` on the current record while holding the guard file lock
    fn with_guard<T>(
        &self,
        name: &LockName,
        f: impl FnOnce(Option<LeaseRecord>) -> Result<T, LockError>,
    ) -> Result<T, LockError> {
        fs::create_dir_all(&self.dir).map_err(storage)?;
        let guard = fs::File::create(self.guard_path(name)).map_err(storage)?;
        guard.lock_exclusive().map_err(storage)?;

        let result = self.read_record(name).and_then(f);

        let _ = guard.unlock();
        result
    }

    fn read_record(&self, name: &LockName) -> Result<Option<LeaseRecord>, LockError> {
        let path = self.lease_path(name);
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "ignoring corrupt lease file");
                    Ok(None)
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage(err)),
        }
    }

    fn write_record(&self, name: &LockName, record: &LeaseRecord) -> Result<(), LockError> {
        let content =
            serde_json::to_string_pretty(record).map_err(|e| LockError::Storage(e.to_string()))?;
        fs::write(self.lease_path(name), content).map_err(storage)
    }

    fn new_token(&self) -> LockToken {
        LockToken::new(format!(
            "{}-{}-{}",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            self.counter.fetch_add(1, Ordering::SeqCst)
        ))
    }
}

fn storage(err: std::io::Error) -> LockError {
    LockError::Storage(err.to_string())
}

fn expiry(ttl: Duration) -> Result<DateTime<Utc>, LockError> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| LockError::Storage(e.to_string()))?;
    Ok(Utc::now() + ttl)
}

impl LockProvider for FileLockProvider {
    fn try_acquire(&self, name: &LockName, ttl: Duration) -> Result<Option<LockToken>, LockError> {
        self.with_guard(name, |current| {
            if let Some(record) = current {
                if record.expires_at > Utc::now() {
                    return Ok(None);
                }
                debug!(lock = %name, holder = record.holder, "taking over expired lease");
            }
            let token = self.new_token();
            self.write_record(
                name,
                &LeaseRecord {
                    name: name.to_string(),
                    token: token.as_str().to_string(),
                    holder: std::process::id(),
                    expires_at: expiry(ttl)?,
                },
            )?;
            Ok(Some(token))
        })
    }

    fn refresh(&self, name: &LockName, token: &LockToken, ttl: Duration) -> Result<bool, LockError> {
        self.with_guard(name, |current| match current {
            Some(mut record) if record.token == token.as_str() => {
                record.expires_at = expiry(ttl)?;
                self.write_record(name, &record)?;
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn release(&self, name: &LockName, token: &LockToken) -> Result<(), LockError> {
        self.with_guard(name, |current| match current {
            Some(record) if record.token == token.as_str() => {
                match fs::remove_file(self.lease_path(name)) {
                    Ok(()) => Ok(()),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                    Err(err) => Err(storage(err)),
                }
            }
            _ => Ok(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn grant_is_exclusive_across_instances() {
        let dir = tempdir().unwrap();
        let a = FileLockProvider::new(dir.path());
        let b = FileLockProvider::new(dir.path());
        let name = LockName::for_destination("web01", 44100, "live");
        let ttl = Duration::from_secs(30);

        let token = a.try_acquire(&name, ttl).unwrap().unwrap();
        assert!(b.try_acquire(&name, ttl).unwrap().is_none());
        assert!(!b.refresh(&name, &LockToken::new("other"), ttl).unwrap());
        assert!(a.refresh(&name, &token, ttl).unwrap());

        a.release(&name, &token).unwrap();
        assert!(b.try_acquire(&name, ttl).unwrap().is_some());
    }

    #[test]
    fn expired_lease_is_taken_over() {
        let dir = tempdir().unwrap();
        let locks = FileLockProvider::new(dir.path());
        let name = LockName::new("dest");

        let first = locks.try_acquire(&name, Duration::ZERO).unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = locks
            .try_acquire(&name, Duration::from_secs(30))
            .unwrap()
            .unwrap();

        assert_ne!(first, second);
        assert!(!locks.refresh(&name, &first, Duration::from_secs(30)).unwrap());
    }

    #[test]
    fn corrupt_lease_file_is_ignored() {
        let dir = tempdir().unwrap();
        let locks = FileLockProvider::new(dir.path());
        let name = LockName::new("dest");
        fs::write(locks.lease_path(&name), "not json").unwrap();

        assert!(locks
            .try_acquire(&name, Duration::from_secs(30))
            .unwrap()
            .is_some());
    }

    #[test]
    fn release_of_foreign_token_keeps_lease() {
        let dir = tempdir().unwrap();
        let locks = FileLockProvider::new(dir.path());
        let name = LockName::new("dest");
        let ttl = Duration::from_secs(30);

        locks.try_acquire(&name, ttl).unwrap().unwrap();
        locks.release(&name, &LockToken::new("someone-else")).unwrap();
        assert!(locks.try_acquire(&name, ttl).unwrap().is_none());
    }
}

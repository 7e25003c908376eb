// Copyright 2019-2024 Arke Institute
// SPDX-License-Identifier: Apache-2.0, MIT

//! File-based advisory lock for the snapshot builder: a
//! `{pid, started_at}` record at a configured path, acquired with
//! `create_new` so two racing builders can't both win, and reclaimable once
//! stale.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ArkeError, ArkeResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    pid: u32,
    started_at: DateTime<Utc>,
}

/// RAII guard: the lock file is removed when this is dropped (or by an
/// explicit call to [`SnapshotLock::release`] when the caller wants the
/// error path, not the `Drop` best-effort one).
pub struct SnapshotLock {
    path: PathBuf,
    released: bool,
}

impl SnapshotLock {
    /// Attempts to acquire the lock at `path`. If a lock file already exists
    /// and is younger than `stale_after`, fails with
    /// [`ArkeError::LockHeld`]; an older one is reclaimed in place.
    pub fn acquire(path: &Path, stale_after: std::time::Duration) -> ArkeResult<Self> {
        match try_create(path) {
            Ok(()) => Ok(SnapshotLock {
                path: path.to_path_buf(),
                released: false,
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let existing = read_record(path)?;
                let age = Utc::now().signed_duration_since(existing.started_at);
                if age.to_std().unwrap_or_default() > stale_after {
                    std::fs::remove_file(path)
                        .map_err(|e| ArkeError::Invariant(format!("reclaiming stale lock: {e}")))?;
                    try_create(path)
                        .map_err(|e| ArkeError::Invariant(format!("re-acquiring lock: {e}")))?;
                    Ok(SnapshotLock {
                        path: path.to_path_buf(),
                        released: false,
                    })
                } else {
                    Err(ArkeError::LockHeld {
                        started_at: existing.started_at,
                    })
                }
            }
            Err(e) => Err(ArkeError::Invariant(format!("acquiring snapshot lock: {e}"))),
        }
    }

    pub fn release(mut self) -> ArkeResult<()> {
        std::fs::remove_file(&self.path)
            .map_err(|e| ArkeError::Invariant(format!("releasing snapshot lock: {e}")))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for SnapshotLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn try_create(path: &Path) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let record = LockRecord {
        pid: std::process::id(),
        started_at: Utc::now(),
    };
    let bytes = serde_json::to_vec(&record).expect("LockRecord always serializes");
    file.write_all(&bytes)
}

fn read_record(path: &Path) -> ArkeResult<LockRecord> {
    let bytes = std::fs::read(path)
        .map_err(|e| ArkeError::Invariant(format!("reading snapshot lock: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ArkeError::Invariant(format!("corrupt snapshot lock: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.lock");
        let guard = SnapshotLock::acquire(&path, std::time::Duration::from_secs(600)).unwrap();
        let err = SnapshotLock::acquire(&path, std::time::Duration::from_secs(600));
        assert!(matches!(err, Err(ArkeError::LockHeld { .. })));
        guard.release().unwrap();
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.lock");
        let stale = LockRecord {
            pid: 1,
            started_at: Utc::now() - chrono::Duration::seconds(3600),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

        let guard = SnapshotLock::acquire(&path, std::time::Duration::from_secs(600)).unwrap();
        guard.release().unwrap();
    }

    #[test]
    fn release_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.lock");
        let guard = SnapshotLock::acquire(&path, std::time::Duration::from_secs(600)).unwrap();
        guard.release().unwrap();
        assert!(!path.exists());
    }
}

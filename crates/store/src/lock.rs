//! Named single-flight locks with leases.
//!
//! A lease expires after its TTL so a crashed holder cannot block the lock
//! forever. Acquisition never waits: a busy lock yields `None`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{Error, Result};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Proof of holding a named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub name: String,
    /// Unique per acquisition
    pub token: Uuid,
    /// Instance that acquired the lease
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockLease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Cross-instance mutual exclusion keyed by name.
#[async_trait]
pub trait SingleFlightLock: Send + Sync {
    /// Takes the lock if it is free or its lease expired.
    async fn try_acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockLease>>;

    /// Releases the lock if `lease` still holds it.
    async fn release(&self, lease: &LockLease) -> Result<()>;
}

/// Runs `fut` only if the named lock is acquired.
///
/// Returns `Ok(None)` without polling `fut` when the lock is busy. The
/// lease is released even if `fut` panics; the panic surfaces as an error.
pub async fn with_lock<F, T>(
    lock: &dyn SingleFlightLock,
    name: &str,
    ttl: Duration,
    fut: F,
) -> Result<Option<T>>
where
    F: Future<Output = T> + Send,
{
    let Some(lease) = lock.try_acquire(name, ttl).await? else {
        debug!(lock = name, "Lock busy, skipping");
        return Ok(None);
    };

    let output = AssertUnwindSafe(fut).catch_unwind().await;

    if lease.is_expired(Utc::now()) {
        warn!(
            lock = name,
            ttl_secs = ttl.as_secs(),
            "Lock held past its lease; another instance may have run concurrently"
        );
    }
    if let Err(e) = lock.release(&lease).await {
        error!(lock = name, error = %e, "Failed to release lock");
    }

    match output {
        Ok(value) => Ok(Some(value)),
        Err(panic) => {
            let msg = panic_message(&*panic);
            error!(lock = name, panic = %msg, "Task panicked while holding lock");
            Err(Error::internal(format!("task under lock {} panicked: {}", name, msg)))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lease table held in process memory.
///
/// Serializes every task of this process that shares the instance; it does
/// not coordinate separate processes.
pub struct InProcessLock {
    holder_id: String,
    leases: Mutex<HashMap<String, LockLease>>,
}

impl InProcessLock {
    pub fn new() -> Self {
        Self::with_holder(format!("instance-{}", Uuid::new_v4()))
    }

    pub fn with_holder(holder_id: impl Into<String>) -> Self {
        Self {
            holder_id: holder_id.into(),
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Current lease for `name`, if any (expired or not).
    pub fn lease(&self, name: &str) -> Option<LockLease> {
        self.leases.lock().get(name).cloned()
    }
}

impl Default for InProcessLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SingleFlightLock for InProcessLock {
    async fn try_acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockLease>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::internal(format!("Invalid lock TTL: {}", e)))?;
        let now = Utc::now();
        let mut leases = self.leases.lock();

        if let Some(current) = leases.get(name) {
            if !current.is_expired(now) {
                return Ok(None);
            }
            warn!(
                lock = name,
                holder = %current.holder_id,
                "Taking over expired lock lease"
            );
        }

        let lease = LockLease {
            name: name.to_string(),
            token: Uuid::new_v4(),
            holder_id: self.holder_id.clone(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        leases.insert(name.to_string(), lease.clone());
        Ok(Some(lease))
    }

    async fn release(&self, lease: &LockLease) -> Result<()> {
        let mut leases = self.leases.lock();
        if leases
            .get(&lease.name)
            .is_some_and(|current| current.token == lease.token)
        {
            leases.remove(&lease.name);
        }
        Ok(())
    }
}

//! Resource Manager
//!
//! Counting semaphore over one named resource. Holders are tracked as a
//! multiset, so a process may hold several permits when `max > 1` and
//! each release returns exactly one of them.
//!
//! Waiting happens on the semaphore's own lock, never on the kernel's.

use crate::sys::process::Pid;
use crate::{KernelError, KernelResult};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Default resource name
pub const DEFAULT_RESOURCE_NAME: &str = "Printer";

/// Default number of concurrent holders
pub const DEFAULT_MAX_HOLDERS: usize = 1;

#[derive(Debug)]
struct Permits {
    /// Permits not currently held
    available: usize,
    /// One entry per held permit, in acquisition order
    holders: Vec<Pid>,
}

/// Named counting semaphore
#[derive(Debug)]
pub struct ResourceManager {
    name: String,
    max: usize,
    permits: Mutex<Permits>,
    freed: Condvar,
}

impl ResourceManager {
    /// Create resource with `max` permits
    pub fn new(name: &str, max: usize) -> KernelResult<Self> {
        if name.trim().is_empty() {
            return Err(KernelError::invalid("resource name must not be empty"));
        }

        if max == 0 {
            return Err(KernelError::invalid("resource needs at least one permit"));
        }

        Ok(Self {
            name: name.to_string(),
            max,
            permits: Mutex::new(Permits { available: max, holders: Vec::new() }),
            freed: Condvar::new(),
        })
    }

    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until a permit is free, then record `pid` as a holder
    pub fn acquire(&self, pid: &Pid) {
        let mut permits = self.permits.lock();
        while permits.available == 0 {
            self.freed.wait(&mut permits);
        }
        self.grant(&mut permits, pid);
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self, pid: &Pid) -> bool {
        let mut permits = self.permits.lock();
        if permits.available == 0 {
            return false;
        }
        self.grant(&mut permits, pid);
        true
    }

    /// Wait at most `timeout` for a permit
    pub fn acquire_timeout(&self, pid: &Pid, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.permits.lock();

        while permits.available == 0 {
            if self.freed.wait_until(&mut permits, deadline).timed_out() && permits.available == 0 {
                tracing::debug!("{} timed out waiting for '{}'", pid, self.name);
                return false;
            }
        }

        self.grant(&mut permits, pid);
        true
    }

    /// Return one permit held by `pid`
    pub fn release(&self, pid: &Pid) -> KernelResult<()> {
        let mut permits = self.permits.lock();

        let Some(idx) = permits.holders.iter().position(|h| h == pid) else {
            tracing::warn!("{} tried to release '{}' without holding it", pid, self.name);
            return Err(KernelError::ResourceNotHeld {
                pid: pid.clone(),
                resource: self.name.clone(),
            });
        };

        permits.holders.remove(idx);
        permits.available += 1;
        self.freed.notify_one();

        tracing::debug!("'{}' released by {}", self.name, pid);
        Ok(())
    }

    /// Return every permit held by `pid`
    pub fn release_all(&self, pid: &Pid) -> usize {
        let mut permits = self.permits.lock();

        let before = permits.holders.len();
        permits.holders.retain(|h| h != pid);
        let released = before - permits.holders.len();

        if released > 0 {
            permits.available += released;
            self.freed.notify_all();
            tracing::debug!("'{}' reclaimed from {} ({} permits)", self.name, pid, released);
        }

        released
    }

    /// Check whether `pid` holds at least one permit
    pub fn is_held_by(&self, pid: &Pid) -> bool {
        self.permits.lock().holders.contains(pid)
    }

    /// Current holders and capacity
    pub fn status(&self) -> ResourceStatus {
        let permits = self.permits.lock();
        ResourceStatus {
            name: self.name.clone(),
            max: self.max,
            available: permits.available,
            holders: permits.holders.clone(),
        }
    }

    fn grant(&self, permits: &mut Permits, pid: &Pid) {
        permits.available -= 1;
        permits.holders.push(pid.clone());
        tracing::debug!("'{}' acquired by {}", self.name, pid);
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self {
            name: DEFAULT_RESOURCE_NAME.to_string(),
            max: DEFAULT_MAX_HOLDERS,
            permits: Mutex::new(Permits {
                available: DEFAULT_MAX_HOLDERS,
                holders: Vec::new(),
            }),
            freed: Condvar::new(),
        }
    }
}

/// Resource snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub name: String,
    pub max: usize,
    pub available: usize,
    pub holders: Vec<Pid>,
}

impl ResourceStatus {
    /// Earliest current holder
    pub fn holder(&self) -> Option<&Pid> {
        self.holders.first()
    }

    /// Check whether nobody holds the resource
    pub fn is_free(&self) -> bool {
        self.holders.is_empty()
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource '{}' held by ", self.name)?;
        if self.holders.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = self.holders.iter().map(Pid::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pid(s: &str) -> Pid {
        Pid::from(s)
    }

    #[test]
    fn test_acquire_release() {
        let rm = ResourceManager::default();
        assert_eq!(rm.status().to_string(), "Resource 'Printer' held by None");

        rm.acquire(&pid("a"));
        assert_eq!(rm.status().holder(), Some(&pid("a")));
        assert_eq!(rm.status().to_string(), "Resource 'Printer' held by a");

        rm.release(&pid("a")).unwrap();
        assert!(rm.status().is_free());
        assert_eq!(rm.status().available, 1);
    }

    #[test]
    fn test_release_by_non_holder() {
        let rm = ResourceManager::default();
        rm.acquire(&pid("a"));

        let err = rm.release(&pid("b")).unwrap_err();
        assert_eq!(err.kind(), "ResourceNotHeld");
        assert_eq!(rm.status().holders, vec![pid("a")]);
        assert_eq!(rm.status().available, 0);
    }

    #[test]
    fn test_try_acquire_when_held() {
        let rm = ResourceManager::default();
        assert!(rm.try_acquire(&pid("a")));
        assert!(!rm.try_acquire(&pid("b")));
        assert!(!rm.is_held_by(&pid("b")));
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let rm = ResourceManager::default();
        rm.acquire(&pid("a"));
        assert!(!rm.acquire_timeout(&pid("b"), Duration::from_millis(20)));
        assert_eq!(rm.status().holders, vec![pid("a")]);
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let rm = Arc::new(ResourceManager::default());
        rm.acquire(&pid("a"));

        let waiter = {
            let rm = Arc::clone(&rm);
            thread::spawn(move || rm.acquire_timeout(&pid("b"), Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(50));
        rm.release(&pid("a")).unwrap();

        assert!(waiter.join().unwrap());
        assert_eq!(rm.status().holders, vec![pid("b")]);
    }

    #[test]
    fn test_multiset_holders() {
        let rm = ResourceManager::new("Scanner", 3).unwrap();
        rm.acquire(&pid("a"));
        rm.acquire(&pid("a"));
        rm.acquire(&pid("b"));
        assert_eq!(rm.status().available, 0);

        rm.release(&pid("a")).unwrap();
        assert!(rm.is_held_by(&pid("a")));
        assert_eq!(rm.status().to_string(), "Resource 'Scanner' held by a, b");

        assert_eq!(rm.release_all(&pid("a")), 1);
        assert_eq!(rm.release_all(&pid("a")), 0);
        assert_eq!(rm.status().available, 2);
    }

    #[test]
    fn test_new_rejects_zero_permits() {
        assert!(ResourceManager::new("Printer", 0).is_err());
        assert!(ResourceManager::new("", 1).is_err());
    }
}

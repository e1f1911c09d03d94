//! Device lock coordinator: a single concurrent map from device key to
//! the session currently holding it, with an atomic compare-and-set
//! acquire and a compare-on-release unlock so a stale caller can never
//! clear somebody else's lock.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use vpt_core::model::{DeviceKey, DeviceSession, SessionId};

#[derive(Default)]
pub struct DeviceLockCoordinator {
    locks: DashMap<DeviceKey, DeviceSession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    /// The caller already held this lock; re-entrant confirmation, not a
    /// fresh grant.
    AlreadyOwned,
    AlreadyHeld,
}

impl DeviceLockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, device_key: &DeviceKey) -> bool {
        self.locks.contains_key(device_key)
    }

    pub fn holder(&self, device_key: &DeviceKey) -> Option<SessionId> {
        self.locks.get(device_key).map(|e| e.session_id.clone())
    }

    /// Acquires the lock if free, or confirms the caller already holds it
    /// (re-entrant for the same session). Returns `AlreadyHeld` when a
    /// different session holds it; the caller is not granted the lock.
    pub fn lock_device(&self, device_key: DeviceKey, session_id: SessionId) -> LockOutcome {
        match self.locks.entry(device_key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(DeviceSession {
                    device_key,
                    session_id,
                    acquired_at: Utc::now(),
                });
                LockOutcome::Acquired
            }
            Entry::Occupied(slot) => {
                if slot.get().session_id == session_id {
                    LockOutcome::AlreadyOwned
                } else {
                    LockOutcome::AlreadyHeld
                }
            }
        }
    }

    /// A no-op unless `session_id` matches the current holder, so a
    /// session that already lost its lock (or never held it) cannot
    /// release someone else's.
    pub fn unlock_device(&self, device_key: &DeviceKey, session_id: &SessionId) -> bool {
        match self.locks.entry(device_key.clone()) {
            Entry::Occupied(slot) if &slot.get().session_id == session_id => {
                slot.remove();
                true
            }
            _ => false,
        }
    }
}

//! Shared state of one logical connection
//!
//! Holds the link currently serving calls, the per-role failure stamps, the
//! reconnection attempt counter and the per-host down list. All interior
//! locks are `parking_lot` locks that are never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use zqlz_core::{HostAddress, Result, ZqlzError};

use crate::link::PhysicalLink;

/// Role slot of a link inside a logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Primary => Role::Secondary,
            Role::Secondary => Role::Primary,
        }
    }
}

#[derive(Debug, Default)]
struct StateInner {
    primary_failed_at: Option<DateTime<Utc>>,
    secondary_failed_at: Option<DateTime<Utc>>,
    attempt_count: u32,
    last_retry_at: Option<DateTime<Utc>>,
    exhausted: bool,
    down_hosts: HashMap<HostAddress, DateTime<Utc>>,
}

impl StateInner {
    fn failed_at_mut(&mut self, role: Role) -> &mut Option<DateTime<Utc>> {
        match role {
            Role::Primary => &mut self.primary_failed_at,
            Role::Secondary => &mut self.secondary_failed_at,
        }
    }
}

/// Mutable facade state owned by one logical connection
pub struct ConnectionState {
    current: RwLock<Arc<dyn PhysicalLink>>,
    inner: Mutex<StateInner>,
    max_attempts: u32,
}

impl ConnectionState {
    pub fn new(initial: Arc<dyn PhysicalLink>, max_attempts: u32) -> Self {
        Self {
            current: RwLock::new(initial),
            inner: Mutex::new(StateInner::default()),
            max_attempts,
        }
    }

    /// Link presently serving calls.
    ///
    /// The answer can be stale as soon as it is returned; a call on a stale
    /// link fails with a connectivity error and goes through failover again.
    pub fn current_link(&self) -> Arc<dyn PhysicalLink> {
        self.current.read().clone()
    }

    pub(crate) fn set_current_link(&self, link: Arc<dyn PhysicalLink>) {
        *self.current.write() = link;
    }

    pub fn failed_at(&self, role: Role) -> Option<DateTime<Utc>> {
        *self.inner.lock().failed_at_mut(role)
    }

    pub fn is_failed(&self, role: Role) -> bool {
        self.failed_at(role).is_some()
    }

    /// Stamp `role` as failed. An existing stamp is kept so it always tells
    /// since when the role has been down. Returns true if the role was
    /// healthy before.
    pub(crate) fn mark_failed(&self, role: Role, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock();
        let slot = inner.failed_at_mut(role);
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }

    /// Clear the failure stamp of `role`. Only called once a link for the
    /// role has been opened and probed.
    pub(crate) fn mark_healthy(&self, role: Role) {
        *self.inner.lock().failed_at_mut(role) = None;
    }

    pub fn attempt_count(&self) -> u32 {
        self.inner.lock().attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_retry_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_retry_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().exhausted
    }

    /// Error returned to every call once the attempt ceiling was reached
    pub fn exhausted_error(&self) -> Option<ZqlzError> {
        let inner = self.inner.lock();
        inner.exhausted.then(|| ZqlzError::AttemptsExhausted {
            attempts: inner.attempt_count,
            max_attempts: self.max_attempts,
        })
    }

    /// Count one search iteration.
    ///
    /// Returns the attempt number, or `AttemptsExhausted` once the count
    /// reaches the ceiling. Exhaustion latches: the counter stops moving and
    /// every later call fails the same way.
    pub(crate) fn begin_attempt(&self, now: DateTime<Utc>) -> Result<u32> {
        let mut inner = self.inner.lock();
        if !inner.exhausted {
            inner.attempt_count += 1;
            inner.last_retry_at = Some(now);
            if inner.attempt_count >= self.max_attempts {
                inner.exhausted = true;
            }
        }
        if inner.exhausted {
            return Err(ZqlzError::AttemptsExhausted {
                attempts: inner.attempt_count,
                max_attempts: self.max_attempts,
            });
        }
        Ok(inner.attempt_count)
    }

    /// Forget counters and stamps, for a brand-new logical connection only
    pub(crate) fn reset_for_new_connection(&self) {
        *self.inner.lock() = StateInner::default();
    }

    pub(crate) fn note_host_down(&self, host: &HostAddress, at: DateTime<Utc>) {
        self.inner.lock().down_hosts.insert(host.clone(), at);
    }

    pub(crate) fn note_host_up(&self, host: &HostAddress) {
        self.inner.lock().down_hosts.remove(host);
    }

    /// Whether the last connection attempt to `host` failed
    pub fn is_host_down(&self, host: &HostAddress) -> bool {
        self.inner.lock().down_hosts.contains_key(host)
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConnectionState")
            .field("current_host", &self.current.read().current_host())
            .field("primary_failed_at", &inner.primary_failed_at)
            .field("secondary_failed_at", &inner.secondary_failed_at)
            .field("attempt_count", &inner.attempt_count)
            .field("max_attempts", &self.max_attempts)
            .field("exhausted", &inner.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCluster;

    async fn state_with_max(max_attempts: u32) -> ConnectionState {
        let cluster = MockCluster::new(&[("db-1", false)]);
        let link = cluster.open_link("db-1").await;
        ConnectionState::new(link, max_attempts)
    }

    #[tokio::test]
    async fn test_mark_failed_keeps_first_stamp() {
        let state = state_with_max(10).await;
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(5);

        assert!(state.mark_failed(Role::Primary, first));
        assert!(!state.mark_failed(Role::Primary, later));
        assert_eq!(state.failed_at(Role::Primary), Some(first));
        assert!(!state.is_failed(Role::Secondary));

        state.mark_healthy(Role::Primary);
        assert!(!state.is_failed(Role::Primary));
    }

    #[tokio::test]
    async fn test_attempt_ceiling_latches() {
        let state = state_with_max(3).await;
        let now = Utc::now();

        assert_eq!(state.begin_attempt(now).unwrap(), 1);
        assert_eq!(state.begin_attempt(now).unwrap(), 2);
        assert!(!state.is_exhausted());

        let err = state.begin_attempt(now).unwrap_err();
        assert!(err.is_terminal());
        assert!(state.is_exhausted());
        assert_eq!(state.attempt_count(), 3);

        // Further attempts do not move the counter past the ceiling
        assert!(state.begin_attempt(now).is_err());
        assert_eq!(state.attempt_count(), 3);
        assert_eq!(state.last_retry_at(), Some(now));
        assert!(state.exhausted_error().is_some());
    }

    #[tokio::test]
    async fn test_reset_for_new_connection() {
        let state = state_with_max(2).await;
        let now = Utc::now();
        let _ = state.begin_attempt(now);
        let _ = state.begin_attempt(now);
        state.mark_failed(Role::Secondary, now);
        state.note_host_down(&HostAddress::new("db-2", 3306), now);

        state.reset_for_new_connection();

        assert_eq!(state.attempt_count(), 0);
        assert!(!state.is_exhausted());
        assert!(!state.is_failed(Role::Secondary));
        assert!(!state.is_host_down(&HostAddress::new("db-2", 3306)));
    }

    #[tokio::test]
    async fn test_down_hosts() {
        let state = state_with_max(5).await;
        let host = HostAddress::new("db-3", 3306);

        state.note_host_down(&host, Utc::now());
        assert!(state.is_host_down(&host));
        state.note_host_up(&host);
        assert!(!state.is_host_down(&host));
    }

    #[test]
    fn test_role_other() {
        assert_eq!(Role::Primary.other(), Role::Secondary);
        assert_eq!(Role::Secondary.other(), Role::Primary);
    }
}

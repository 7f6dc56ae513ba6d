//! Notifications about failover progress
//!
//! Events are published on a `tokio::sync::broadcast` channel. Sending never
//! waits: a lagging receiver loses old events and a missing receiver is
//! ignored.

use serde::Serialize;
use zqlz_core::HostAddress;

use crate::state::Role;

/// Capacity of the event channel of one logical connection
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FailoverEvent {
    /// A call on `host` failed with a connectivity error
    RoleFailed { role: Role, host: HostAddress },
    /// Calls moved to the already-connected link of `to`
    Takeover { from: Role, to: Role, host: HostAddress },
    /// The primary link turned out to be read-only
    Demoted { host: HostAddress },
    /// A search iteration started
    SearchStarted { attempt: u32 },
    /// A link was installed for `role`
    RoleRestored { role: Role, host: HostAddress },
    /// Every role has a healthy link again
    Stable,
    /// The attempt ceiling was reached
    Exhausted { attempts: u32 },
}

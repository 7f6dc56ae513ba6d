//! Failover orchestration
//!
//! The listener owns the primary and secondary links of one logical
//! connection and decides what happens when a call fails:
//!
//! - a failure on a superseded link is replayed on the current one
//! - a secondary failure with a healthy primary moves calls to the primary
//!   right away, re-checking that it is still writable
//! - anything else starts the host search, guarded by a single-flight flag;
//!   the caller that wins the flag runs one attempt inline and the rest
//!   runs on the [`RetryScheduler`](crate::scheduler) cadence
//!
//! Decisions are serialized with an async mutex. The mutex is never held
//! while the search connects to hosts.


use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use zqlz_core::{HostAddress, QueryResult, Result, ZqlzError};

use crate::config::FailoverConfig;
use crate::events::{EVENT_CHANNEL_CAPACITY, FailoverEvent};
use crate::link::{LinkRole, PhysicalLink};
use crate::operation::Operation;
use crate::scheduler::{RetryScheduler, SearchTask};
use crate::state::{ConnectionState, Role};
use crate::strategy::TopologySearchStrategy;

/// Where a logical connection stands in the failover cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverPhase {
    /// Every role has a healthy link and no search is running
    Stable,
    /// At least one role is down and no search is running
    RoleFailedPendingSearch,
    /// A search owns the single-flight flag
    Searching,
    /// The attempt ceiling was reached; the connection is unusable
    Exhausted,
}

impl std::fmt::Display for FailoverPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailoverPhase::Stable => write!(f, "stable"),
            FailoverPhase::RoleFailedPendingSearch => write!(f, "role failed, search pending"),
            FailoverPhase::Searching => write!(f, "searching"),
            FailoverPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Outcome of [`FailoverListener::handle`]
#[derive(Debug)]
pub struct HandleErrorResult {
    /// The failure was absorbed and the operation replayed
    pub handled: bool,
    /// Result of the replay
    pub replayed_result: Option<QueryResult>,
    /// The caller must return its original error
    pub should_rethrow: bool,
}

impl HandleErrorResult {
    fn replayed(result: QueryResult) -> Self {
        Self {
            handled: true,
            replayed_result: Some(result),
            should_rethrow: false,
        }
    }

    fn unhandled() -> Self {
        Self {
            handled: false,
            replayed_result: None,
            should_rethrow: true,
        }
    }
}

/// Result of one search iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchOutcome {
    /// Every needed role has a link
    Complete,
    /// Some role is still missing
    Incomplete,
}

enum Takeover {
    /// Calls run on the target now; `superseded` must be closed once the
    /// decision lock is released
    Done {
        superseded: Option<Arc<dyn PhysicalLink>>,
    },
    /// The target failed too
    TargetFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    /// Run one attempt on the calling task, then hand over to the scheduler
    Immediate,
    /// Leave every attempt to the scheduler
    Background,
}

pub struct FailoverListener {
    state: ConnectionState,
    primary: RwLock<Option<Arc<dyn PhysicalLink>>>,
    secondary: RwLock<Option<Arc<dyn PhysicalLink>>>,
    strategy: Arc<dyn TopologySearchStrategy>,
    search_in_progress: AtomicBool,
    searches_started: AtomicU64,
    handler_lock: Mutex<()>,
    scheduler: RetryScheduler,
    events: broadcast::Sender<FailoverEvent>,
    multi_host: bool,
    closed: AtomicBool,
    self_ref: Weak<FailoverListener>,
}

impl FailoverListener {
    /// Create a listener around an already opened link.
    ///
    /// Nothing is probed until [`initialize`](Self::initialize) runs.
    pub fn new(
        initial_link: Arc<dyn PhysicalLink>,
        strategy: Arc<dyn TopologySearchStrategy>,
        config: &FailoverConfig,
    ) -> Arc<Self> {
        let multi_host = initial_link.host_list().len() > 1;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Arc::new_cyclic(|self_ref| Self {
            state: ConnectionState::new(initial_link, config.max_attempts()),
            primary: RwLock::new(None),
            secondary: RwLock::new(None),
            strategy,
            search_in_progress: AtomicBool::new(false),
            searches_started: AtomicU64::new(0),
            handler_lock: Mutex::new(()),
            scheduler: RetryScheduler::new(config.schedule_interval()),
            events,
            multi_host,
            closed: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Place the initial link in the slot matching its role and go looking
    /// for the other role.
    ///
    /// Fails if the initial link cannot be probed or if the first search
    /// attempt already hits the attempt ceiling.
    pub async fn initialize(&self) -> Result<()> {
        self.state.reset_for_new_connection();
        let link = self.state.current_link();

        if !self.multi_host {
            *self.primary.write() = Some(link);
            return Ok(());
        }

        let role = link.probe_role().await?;
        let now = Utc::now();
        match role {
            LinkRole::Secondary => {
                *self.secondary.write() = Some(link.clone());
                self.state.mark_failed(Role::Primary, now);
            }
            LinkRole::Primary | LinkRole::Unknown => {
                *self.primary.write() = Some(link.clone());
                self.state.mark_failed(Role::Secondary, now);
            }
        }
        tracing::info!(
            host = %link.current_host(),
            role = ?role,
            strategy = self.strategy.name(),
            "failover connection initialized"
        );

        match self.launch_search(SearchMode::Immediate).await {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> FailoverPhase {
        if self.state.is_exhausted() {
            FailoverPhase::Exhausted
        } else if self.search_in_progress.load(Ordering::SeqCst) {
            FailoverPhase::Searching
        } else if self.state.is_failed(Role::Primary)
            || (self.multi_host && self.state.is_failed(Role::Secondary))
        {
            FailoverPhase::RoleFailedPendingSearch
        } else {
            FailoverPhase::Stable
        }
    }

    pub fn is_searching(&self) -> bool {
        self.search_in_progress.load(Ordering::SeqCst)
    }

    /// Whether the background search loop is running
    pub fn is_retry_scheduled(&self) -> bool {
        self.scheduler.is_running()
    }

    /// How many times the single-flight flag went from unset to set
    pub fn searches_started(&self) -> u64 {
        self.searches_started.load(Ordering::SeqCst)
    }

    pub fn primary_link(&self) -> Option<Arc<dyn PhysicalLink>> {
        self.slot(Role::Primary).read().clone()
    }

    pub fn secondary_link(&self) -> Option<Arc<dyn PhysicalLink>> {
        self.slot(Role::Secondary).read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FailoverEvent> {
        self.events.subscribe()
    }

    /// Decide what to do about a connectivity error raised by `failed_link`.
    ///
    /// Returns the replayed result when the failure was absorbed,
    /// `handled = false` when the caller should return its original error,
    /// and `Err` when the attempt ceiling is reached or the replay failed.
    pub async fn handle(
        &self,
        failed_link: &Arc<dyn PhysicalLink>,
        operation: &Operation,
        error: &ZqlzError,
    ) -> Result<HandleErrorResult> {
        let guard = self.handler_lock.lock().await;

        if let Some(err) = self.state.exhausted_error() {
            return Err(err);
        }

        let current = self.state.current_link();
        if !Arc::ptr_eq(&current, failed_link) && !current.is_closed() {
            drop(guard);
            tracing::debug!(
                operation = operation.id(),
                failed_host = %failed_link.current_host(),
                current_host = %current.current_host(),
                "failure on a superseded link"
            );
            return self.replay(operation).await;
        }

        let role = self.role_of(failed_link);
        let read_only = failed_link.session().read_only;
        if self.state.mark_failed(role, Utc::now()) {
            tracing::warn!(
                role = ?role,
                host = %failed_link.current_host(),
                operation = operation.id(),
                error = %error,
                "link failed"
            );
            self.emit(FailoverEvent::RoleFailed {
                role,
                host: failed_link.current_host().clone(),
            });
        }

        let takeover_target = match role {
            Role::Secondary => self.healthy_link(Role::Primary).map(|l| (Role::Primary, l)),
            Role::Primary if read_only => {
                self.healthy_link(Role::Secondary).map(|l| (Role::Secondary, l))
            }
            Role::Primary => None,
        };

        if let Some((target_role, target)) = takeover_target {
            if let Takeover::Done { superseded } =
                self.take_over(failed_link, role, &target, target_role).await
            {
                drop(guard);
                if let Some(link) = superseded {
                    close_quietly(link).await;
                }
                self.launch_search(SearchMode::Background).await;
                return self.replay(operation).await;
            }
        }

        drop(guard);
        match self.launch_search(SearchMode::Immediate).await {
            None => {
                tracing::debug!(
                    operation = operation.id(),
                    "search already running, not waiting for it"
                );
                Ok(HandleErrorResult::unhandled())
            }
            Some(Err(e)) => Err(e),
            Some(Ok(_)) if self.role_restored(role, read_only, failed_link) => {
                self.replay(operation).await
            }
            Some(Ok(_)) => Ok(HandleErrorResult::unhandled()),
        }
    }

    /// Route calls to the secondary (read-only) or back to the primary.
    ///
    /// Without a healthy target the current link is kept. Leaving read-only
    /// mode while the primary is down triggers a search attempt first.
    pub async fn switch_read_only(&self, read_only: bool) -> Result<()> {
        if !self.multi_host {
            return Ok(());
        }

        let target_role = if read_only {
            Role::Secondary
        } else {
            Role::Primary
        };

        if !read_only && self.healthy_link(Role::Primary).is_none() {
            if let Some(Err(e)) = self.launch_search(SearchMode::Immediate).await {
                return Err(e);
            }
        }

        let _guard = self.handler_lock.lock().await;
        let Some(target) = self.healthy_link(target_role) else {
            tracing::debug!(read_only, "no healthy link to switch to, keeping current link");
            return Ok(());
        };
        let current = self.state.current_link();
        if Arc::ptr_eq(&target, &current) {
            return Ok(());
        }

        if let Err(e) = target.sync_session_from(&current.session()).await {
            if e.is_connectivity() {
                self.state.mark_failed(target_role, Utc::now());
                tracing::warn!(
                    role = ?target_role,
                    host = %target.current_host(),
                    error = %e,
                    "link failed while switching read-only mode"
                );
                return Ok(());
            }
            return Err(e);
        }

        self.state.set_current_link(target.clone());
        tracing::debug!(
            read_only,
            host = %target.current_host(),
            "switched link for read-only mode"
        );
        Ok(())
    }

    /// Stop the background search and close every link
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.scheduler.stop();
        self.search_in_progress.store(false, Ordering::SeqCst);

        let mut links: Vec<Arc<dyn PhysicalLink>> = Vec::new();
        for link in [
            self.primary.write().take(),
            self.secondary.write().take(),
            Some(self.state.current_link()),
        ]
        .into_iter()
        .flatten()
        {
            if !links.iter().any(|l| Arc::ptr_eq(l, &link)) {
                links.push(link);
            }
        }

        let mut first_error = None;
        for link in links {
            if let Err(e) = link.close().await {
                first_error.get_or_insert(e);
            }
        }
        tracing::debug!("failover listener closed");
        first_error.map_or(Ok(()), Err)
    }

    /// One search iteration: count the attempt, order the candidates, then
    /// connect and probe until every missing role has a link.
    pub(crate) async fn search_once(&self) -> Result<SearchOutcome> {
        let need_primary = self.needs(Role::Primary);
        let need_secondary = self.multi_host && self.needs(Role::Secondary);
        if !need_primary && !need_secondary {
            return Ok(SearchOutcome::Complete);
        }

        let attempt = self.state.begin_attempt(Utc::now())?;
        self.emit(FailoverEvent::SearchStarted { attempt });

        let healthy_primary = self.healthy_link(Role::Primary);
        let healthy_secondary = self.healthy_link(Role::Secondary);
        let taken: Vec<HostAddress> = [&healthy_primary, &healthy_secondary]
            .into_iter()
            .flatten()
            .map(|link| link.current_host().clone())
            .collect();

        let template = self.state.current_link();
        let (mut candidates, mut recently_down): (Vec<HostAddress>, Vec<HostAddress>) = template
            .host_list()
            .iter()
            .filter(|host| !taken.contains(host))
            .cloned()
            .partition(|host| !self.state.is_host_down(host));
        candidates.append(&mut recently_down);

        let candidates = self
            .strategy
            .order_candidates(candidates, need_primary, need_secondary, healthy_secondary)
            .await;
        tracing::debug!(
            attempt,
            max_attempts = self.state.max_attempts(),
            need_primary,
            need_secondary,
            candidates = ?candidates,
            "searching for replacement hosts"
        );

        for host in candidates {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            let need_primary = self.needs(Role::Primary);
            let need_secondary = self.multi_host && self.needs(Role::Secondary);
            if !need_primary && !need_secondary {
                break;
            }

            let link = match template.connect(&host).await {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!(attempt, host = %host, error = %e, "connection attempt failed");
                    self.state.note_host_down(&host, Utc::now());
                    continue;
                }
            };
            self.state.note_host_up(&host);

            let role = if self.multi_host {
                match link.probe_role().await {
                    Ok(role) => role,
                    Err(e) => {
                        tracing::warn!(attempt, host = %host, error = %e, "role probe failed");
                        self.state.note_host_down(&host, Utc::now());
                        close_quietly(link).await;
                        continue;
                    }
                }
            } else {
                LinkRole::Primary
            };

            let slot = match role {
                LinkRole::Primary if need_primary => Some(Role::Primary),
                LinkRole::Secondary if need_secondary => Some(Role::Secondary),
                LinkRole::Unknown if need_primary => Some(Role::Primary),
                LinkRole::Unknown if need_secondary => Some(Role::Secondary),
                _ => None,
            };
            let Some(slot) = slot else {
                tracing::debug!(host = %host, role = ?role, "host role not needed");
                close_quietly(link).await;
                continue;
            };

            let source = self.state.current_link().session();
            if let Err(e) = link.sync_session_from(&source).await {
                tracing::warn!(host = %host, error = %e, "could not restore session state");
                close_quietly(link).await;
                continue;
            }

            self.install(slot, link).await;
        }

        Ok(if self.role_missing() {
            SearchOutcome::Incomplete
        } else {
            SearchOutcome::Complete
        })
    }

    /// Win the single-flight flag and start searching.
    ///
    /// Returns `None` when another search already owns the flag, otherwise
    /// the outcome of the inline attempt (`Incomplete` in background mode).
    async fn launch_search(&self, mode: SearchMode) -> Option<Result<SearchOutcome>> {
        if self.closed.load(Ordering::SeqCst)
            || self
                .search_in_progress
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            return None;
        }
        self.searches_started.fetch_add(1, Ordering::SeqCst);

        match mode {
            SearchMode::Background => {
                self.scheduler.start(self.self_ref.clone(), Duration::ZERO);
                Some(Ok(SearchOutcome::Incomplete))
            }
            SearchMode::Immediate => {
                let outcome = self.search_once().await;
                match outcome {
                    Ok(SearchOutcome::Incomplete) => {
                        self.scheduler
                            .start(self.self_ref.clone(), self.scheduler.interval());
                    }
                    _ => self.finish_search(&outcome),
                }
                Some(outcome)
            }
        }
    }

    /// Release the single-flight flag after a search ended.
    ///
    /// A role that failed while the flag was still held lost its own launch,
    /// so a completed search starts over in the background for it.
    fn finish_search(&self, outcome: &Result<SearchOutcome>) {
        self.search_in_progress.store(false, Ordering::SeqCst);
        match outcome {
            Ok(SearchOutcome::Complete) if self.role_missing() => {
                if !self.closed.load(Ordering::SeqCst)
                    && self
                        .search_in_progress
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                {
                    tracing::debug!("role failed while the search was finishing, searching again");
                    self.searches_started.fetch_add(1, Ordering::SeqCst);
                    self.scheduler.start(self.self_ref.clone(), Duration::ZERO);
                }
            }
            Ok(SearchOutcome::Complete) => {
                tracing::info!(
                    attempts = self.state.attempt_count(),
                    "all roles restored"
                );
                self.emit(FailoverEvent::Stable);
            }
            Ok(SearchOutcome::Incomplete) => {}
            Err(e) => {
                tracing::error!(
                    attempts = self.state.attempt_count(),
                    max_attempts = self.state.max_attempts(),
                    error = %e,
                    "giving up on failover"
                );
                self.emit(FailoverEvent::Exhausted {
                    attempts: self.state.attempt_count(),
                });
            }
        }
    }

    /// Move calls from `failed` to `target`, already connected.
    async fn take_over(
        &self,
        failed: &Arc<dyn PhysicalLink>,
        failed_role: Role,
        target: &Arc<dyn PhysicalLink>,
        target_role: Role,
    ) -> Takeover {
        if let Err(e) = target.sync_session_from(&failed.session()).await {
            if e.is_connectivity() {
                self.state.mark_failed(target_role, Utc::now());
                tracing::warn!(
                    role = ?target_role,
                    host = %target.current_host(),
                    error = %e,
                    "takeover target failed"
                );
                return Takeover::TargetFailed;
            }
            tracing::warn!(host = %target.current_host(), error = %e, "could not restore session state");
        }

        self.state.set_current_link(target.clone());
        tracing::info!(
            from = ?failed_role,
            to = ?target_role,
            host = %target.current_host(),
            "moved calls to the other role"
        );
        self.emit(FailoverEvent::Takeover {
            from: failed_role,
            to: target_role,
            host: target.current_host().clone(),
        });

        if target_role != Role::Primary {
            return Takeover::Done { superseded: None };
        }

        match target.probe_role().await {
            Ok(LinkRole::Secondary) => {
                // The old primary stays current for reads but both roles
                // have to be found again
                self.state.mark_failed(Role::Primary, Utc::now());
                self.primary.write().take();
                let superseded = self.secondary.write().replace(target.clone());
                tracing::info!(host = %target.current_host(), "primary is read-only now, demoted");
                self.emit(FailoverEvent::Demoted {
                    host: target.current_host().clone(),
                });
                Takeover::Done {
                    superseded: superseded.filter(|link| !Arc::ptr_eq(link, target)),
                }
            }
            Ok(_) => Takeover::Done { superseded: None },
            Err(e) if e.is_connectivity() => {
                self.state.mark_failed(Role::Primary, Utc::now());
                tracing::warn!(host = %target.current_host(), error = %e, "primary failed during takeover");
                Takeover::TargetFailed
            }
            Err(e) => {
                tracing::debug!(host = %target.current_host(), error = %e, "role probe after takeover failed");
                Takeover::Done { superseded: None }
            }
        }
    }

    /// Put `link` in the `role` slot and route calls to it where needed.
    async fn install(&self, role: Role, link: Arc<dyn PhysicalLink>) -> bool {
        let guard = self.handler_lock.lock().await;

        let same_host_elsewhere = self
            .healthy_link(role.other())
            .is_some_and(|other| other.current_host() == link.current_host());
        if same_host_elsewhere || self.closed.load(Ordering::SeqCst) {
            drop(guard);
            if same_host_elsewhere {
                tracing::warn!(
                    role = ?role,
                    host = %link.current_host(),
                    "host already serves the other role, not installing"
                );
            }
            close_quietly(link).await;
            return false;
        }

        let previous = self.slot(role).write().replace(link.clone());
        self.state.mark_healthy(role);

        let current = self.state.current_link();
        let current_is = |candidate: &Option<Arc<dyn PhysicalLink>>| {
            candidate
                .as_ref()
                .is_some_and(|candidate| Arc::ptr_eq(candidate, &current))
        };
        let route = match role {
            Role::Primary => {
                let reads_on_secondary =
                    current.session().read_only && current_is(&self.healthy_link(Role::Secondary));
                !reads_on_secondary || current.is_closed()
            }
            Role::Secondary => {
                current_is(&previous)
                    || current.is_closed()
                    || current.session().read_only
                    || self.healthy_link(Role::Primary).is_none()
            }
        };
        if route {
            self.state.set_current_link(link.clone());
        }

        tracing::info!(
            role = ?role,
            host = %link.current_host(),
            current = route,
            "link restored"
        );
        self.emit(FailoverEvent::RoleRestored {
            role,
            host: link.current_host().clone(),
        });

        let other = self.slot(role.other()).read().clone();
        drop(guard);

        if let Some(previous) = previous {
            let reused = Arc::ptr_eq(&previous, &link)
                || other.is_some_and(|other| Arc::ptr_eq(&other, &previous))
                || Arc::ptr_eq(&previous, &self.state.current_link());
            if !reused {
                close_quietly(previous).await;
            }
        }
        true
    }

    async fn replay(&self, operation: &Operation) -> Result<HandleErrorResult> {
        let link = self.state.current_link();
        tracing::debug!(
            operation = operation.id(),
            host = %link.current_host(),
            "replaying operation"
        );
        let result = link.dispatch(operation).await?;
        Ok(HandleErrorResult::replayed(result))
    }

    /// Whether the call that failed on `failed` can run again
    fn role_restored(&self, role: Role, read_only: bool, failed: &Arc<dyn PhysicalLink>) -> bool {
        let current = self.state.current_link();
        if current.is_closed() || Arc::ptr_eq(&current, failed) {
            return false;
        }
        let reads_on_secondary = read_only
            && self
                .healthy_link(Role::Secondary)
                .is_some_and(|link| Arc::ptr_eq(&link, &current));
        !self.needs(role) || reads_on_secondary
    }

    fn role_of(&self, link: &Arc<dyn PhysicalLink>) -> Role {
        let in_slot =
            |slot: &RwLock<Option<Arc<dyn PhysicalLink>>>| {
                slot.read()
                    .as_ref()
                    .is_some_and(|candidate| Arc::ptr_eq(candidate, link))
            };
        if self.multi_host && !in_slot(&self.primary) && in_slot(&self.secondary) {
            Role::Secondary
        } else {
            Role::Primary
        }
    }

    fn slot(&self, role: Role) -> &RwLock<Option<Arc<dyn PhysicalLink>>> {
        match role {
            Role::Primary => &self.primary,
            Role::Secondary => &self.secondary,
        }
    }

    /// Link of `role` if it is open and the role is not marked failed
    fn healthy_link(&self, role: Role) -> Option<Arc<dyn PhysicalLink>> {
        if self.state.is_failed(role) {
            return None;
        }
        self.slot(role)
            .read()
            .clone()
            .filter(|link| !link.is_closed())
    }

    fn needs(&self, role: Role) -> bool {
        self.healthy_link(role).is_none()
    }

    fn role_missing(&self) -> bool {
        self.needs(Role::Primary) || (self.multi_host && self.needs(Role::Secondary))
    }

    fn emit(&self, event: FailoverEvent) {
        // No receiver is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SearchTask for FailoverListener {
    async fn run_iteration(&self) -> ControlFlow<()> {
        if self.closed.load(Ordering::SeqCst) {
            return ControlFlow::Break(());
        }
        let outcome = self.search_once().await;
        if let Ok(SearchOutcome::Incomplete) = outcome {
            return ControlFlow::Continue(());
        }
        self.scheduler.detach();
        self.finish_search(&outcome);
        ControlFlow::Break(())
    }
}

impl std::fmt::Debug for FailoverListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverListener")
            .field("phase", &self.phase())
            .field("strategy", &self.strategy.name())
            .field("multi_host", &self.multi_host)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

async fn close_quietly(link: Arc<dyn PhysicalLink>) {
    if let Err(e) = link.close().await {
        tracing::debug!(host = %link.current_host(), error = %e, "error closing link");
    }
}

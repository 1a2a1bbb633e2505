use crate::error::{Result, SupervisorError};
use crate::ports::{SessionFactory, ToolSession};
use router_mcp_client::TerminationCallback;
use router_protocol::ServerConfig;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Observable lifecycle of one managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    Starting,
    Ready,
    Stopping,
    Failed,
}

/// Point-in-time view of one table entry, as reported by
/// `list_running_servers`.
#[derive(Debug, Clone, Serialize)]
pub struct RunningServerSnapshot {
    pub server_name: String,
    pub state: ServerState,
    pub in_flight: usize,
    /// Unix seconds; absent while still starting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    pub idle_seconds: u64,
}

enum SlotState {
    Starting,
    Ready(Arc<dyn ToolSession>),
    Failed(String),
}

struct ServerSlot {
    name: String,
    start_lock: tokio::sync::Mutex<()>,
    state: Mutex<SlotState>,
    in_flight: AtomicUsize,
    last_used: Mutex<Instant>,
    started_at: Mutex<Option<u64>>,
}

impl ServerSlot {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            start_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SlotState::Starting),
            in_flight: AtomicUsize::new(0),
            last_used: Mutex::new(Instant::now()),
            started_at: Mutex::new(None),
        })
    }

    fn ready_session(&self) -> Option<Arc<dyn ToolSession>> {
        match &*self.state.lock().unwrap() {
            SlotState::Ready(session) => Some(session.clone()),
            _ => None,
        }
    }

    fn mark_ready(&self, session: Arc<dyn ToolSession>) {
        *self.state.lock().unwrap() = SlotState::Ready(session);
        *self.started_at.lock().unwrap() = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );
        log::info!("server '{}': STARTING -> READY", self.name);
    }

    fn mark_failed(&self, reason: &str) {
        *self.state.lock().unwrap() = SlotState::Failed(reason.to_string());
        log::warn!("server '{}': -> FAILED ({reason})", self.name);
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap() = Instant::now();
    }

    fn snapshot(&self) -> RunningServerSnapshot {
        let state = match &*self.state.lock().unwrap() {
            SlotState::Starting => ServerState::Starting,
            SlotState::Ready(_) => ServerState::Ready,
            SlotState::Failed(_) => ServerState::Failed,
        };
        RunningServerSnapshot {
            server_name: self.name.clone(),
            state,
            in_flight: self.in_flight.load(Ordering::SeqCst),
            started_at: *self.started_at.lock().unwrap(),
            idle_seconds: self.last_used.lock().unwrap().elapsed().as_secs(),
        }
    }
}

/// Holds a session for the duration of one call. Dropping the lease
/// releases the slot and refreshes its idle clock.
pub struct ServerLease {
    slot: Arc<ServerSlot>,
    session: Arc<dyn ToolSession>,
}

impl std::fmt::Debug for ServerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLease").finish_non_exhaustive()
    }
}

impl ServerLease {
    fn new(slot: Arc<ServerSlot>, session: Arc<dyn ToolSession>) -> Self {
        slot.in_flight.fetch_add(1, Ordering::SeqCst);
        slot.touch();
        Self { slot, session }
    }

    pub fn session(&self) -> &Arc<dyn ToolSession> {
        &self.session
    }
}

impl Drop for ServerLease {
    fn drop(&mut self) {
        self.slot.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.slot.touch();
    }
}

struct SupervisorInner {
    configs: BTreeMap<String, ServerConfig>,
    factory: Arc<dyn SessionFactory>,
    // The only shared mutable structure; never held across an await.
    table: Mutex<HashMap<String, Arc<ServerSlot>>>,
    idle_ttl: Duration,
    drain_grace: Duration,
}

impl SupervisorInner {
    /// Detach a slot from the table if it is still the current entry.
    fn detach(&self, slot: &Arc<ServerSlot>) {
        let mut table = self.table.lock().unwrap();
        if let Some(current) = table.get(&slot.name) {
            if Arc::ptr_eq(current, slot) {
                table.remove(&slot.name);
            }
        }
    }

    fn handle_termination(self: &Arc<Self>, name: &str) {
        let slot = self.table.lock().unwrap().remove(name);
        if let Some(slot) = slot {
            slot.mark_failed("session terminated");
            log::warn!("server '{name}': FAILED -> absent (will restart on next use)");
        }
    }
}

/// The server table. Cheap to clone; all clones share one table.
#[derive(Clone)]
pub struct ServerSupervisor {
    inner: Arc<SupervisorInner>,
}

impl ServerSupervisor {
    pub fn new(
        configs: BTreeMap<String, ServerConfig>,
        factory: Arc<dyn SessionFactory>,
        idle_ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                configs,
                factory,
                table: Mutex::new(HashMap::new()),
                idle_ttl,
                drain_grace: Duration::from_secs(10),
            }),
        }
    }

    /// Return a lease on a READY session, starting the server on demand.
    ///
    /// Concurrent acquires for one server serialize on the slot's start
    /// lock, so at most one start attempt runs at a time.
    pub async fn acquire(&self, name: &str) -> Result<ServerLease> {
        let config = self
            .inner
            .configs
            .get(name)
            .ok_or_else(|| SupervisorError::UnknownServer(name.to_string()))?
            .clone();

        loop {
            let slot = self.get_or_create_slot(name);

            if let Some(session) = slot.ready_session() {
                return Ok(ServerLease::new(slot, session));
            }

            let _start = slot.start_lock.lock().await;

            // Someone else may have finished the start while we waited.
            if let Some(session) = slot.ready_session() {
                drop(_start);
                return Ok(ServerLease::new(slot, session));
            }

            // A crash or shutdown detached this slot while we queued; take a
            // fresh one.
            if !self.is_current(&slot) {
                continue;
            }

            log::info!("server '{name}': absent -> STARTING");
            let callback = self.termination_callback();
            match self.inner.factory.start(&config, callback).await {
                Ok(session) => {
                    slot.mark_ready(session.clone());
                    drop(_start);
                    return Ok(ServerLease::new(slot, session));
                }
                Err(e) => {
                    slot.mark_failed(&e.to_string());
                    self.inner.detach(&slot);
                    return Err(e.into());
                }
            }
        }
    }

    /// Explicit start, as exposed by `manage_server`.
    pub async fn start(&self, name: &str) -> Result<RunningServerSnapshot> {
        let lease = self.acquire(name).await?;
        let slot = lease.slot.clone();
        drop(lease);
        Ok(slot.snapshot())
    }

    /// Explicit shutdown. Waits for in-flight calls to drain up to the
    /// grace deadline, then terminates regardless. Returns false when the
    /// server was not running.
    pub async fn shutdown(&self, name: &str) -> Result<bool> {
        if !self.inner.configs.contains_key(name) {
            return Err(SupervisorError::UnknownServer(name.to_string()));
        }
        let slot = self.inner.table.lock().unwrap().remove(name);
        let Some(slot) = slot else {
            return Ok(false);
        };
        log::info!("server '{name}': -> STOPPING");

        let deadline = Instant::now() + self.inner.drain_grace;
        while slot.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        if slot.in_flight.load(Ordering::SeqCst) > 0 {
            log::warn!("server '{name}': drain grace expired, terminating with calls in flight");
        }

        if let Some(session) = slot.ready_session() {
            session.shutdown().await;
        }
        log::info!("server '{name}': STOPPING -> absent");
        Ok(true)
    }

    /// Drop a server's slot without the drain dance. Used after a crash so
    /// the next acquire starts fresh.
    pub fn invalidate(&self, name: &str) {
        self.inner.handle_termination(name);
    }

    pub fn list_running(&self) -> Vec<RunningServerSnapshot> {
        let mut snapshots: Vec<RunningServerSnapshot> = self
            .inner
            .table
            .lock()
            .unwrap()
            .values()
            .map(|slot| slot.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.server_name.cmp(&b.server_name));
        snapshots
    }

    /// One eviction pass: shut down READY servers that are idle past the
    /// TTL with nothing in flight.
    pub async fn sweep_idle(&self) {
        let candidates: Vec<Arc<ServerSlot>> = {
            let table = self.inner.table.lock().unwrap();
            table
                .values()
                .filter(|slot| {
                    slot.in_flight.load(Ordering::SeqCst) == 0
                        && slot.ready_session().is_some()
                        && slot.last_used.lock().unwrap().elapsed() > self.inner.idle_ttl
                })
                .cloned()
                .collect()
        };

        for slot in candidates {
            // Re-check under no lock; a call may have landed meanwhile.
            if slot.in_flight.load(Ordering::SeqCst) > 0 {
                continue;
            }
            log::info!(
                "server '{}': idle for more than {:?}, evicting",
                slot.name,
                self.inner.idle_ttl
            );
            self.inner.detach(&slot);
            if let Some(session) = slot.ready_session() {
                session.shutdown().await;
            }
        }
    }

    /// Background eviction loop. Stops on its own once the supervisor is
    /// dropped.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = (self.inner.idle_ttl / 4).max(Duration::from_secs(5));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let supervisor = ServerSupervisor { inner };
                supervisor.sweep_idle().await;
            }
        })
    }

    /// Shut down every running server; used at process exit.
    pub async fn shutdown_all(&self) {
        let names: Vec<String> = self
            .inner
            .table
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        for name in names {
            if let Err(e) = self.shutdown(&name).await {
                log::warn!("shutdown of '{name}' failed: {e}");
            }
        }
    }

    fn get_or_create_slot(&self, name: &str) -> Arc<ServerSlot> {
        let mut table = self.inner.table.lock().unwrap();
        table
            .entry(name.to_string())
            .or_insert_with(|| ServerSlot::new(name))
            .clone()
    }

    fn is_current(&self, slot: &Arc<ServerSlot>) -> bool {
        let table = self.inner.table.lock().unwrap();
        table
            .get(&slot.name)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn termination_callback(&self) -> TerminationCallback {
        let weak: Weak<SupervisorInner> = Arc::downgrade(&self.inner);
        Arc::new(move |name: &str| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_termination(name);
            }
        })
    }
}

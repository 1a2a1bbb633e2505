use async_trait::async_trait;
use router_mcp_client::{McpClientError, TerminationCallback};
use router_protocol::{RawPart, RawToolResult, ServerConfig, ToolSpec};
use router_supervisor::{
    ServerState, ServerSupervisor, SessionFactory, SupervisorError, ToolSession,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct StubSession {
    name: String,
    shut_down: AtomicBool,
}

#[async_trait]
impl ToolSession for StubSession {
    async fn list_tools(&self, _timeout: Duration) -> Result<Vec<ToolSpec>, McpClientError> {
        Ok(vec![])
    }

    async fn call_tool(
        &self,
        tool: &str,
        _arguments: Option<serde_json::Map<String, serde_json::Value>>,
        _timeout: Duration,
    ) -> Result<RawToolResult, McpClientError> {
        Ok(RawToolResult {
            parts: vec![RawPart::Text {
                text: format!("{}:{tool}", self.name),
            }],
            is_error: false,
        })
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct StubFactory {
    starts: AtomicUsize,
    start_delay_ms: u64,
    fail_next: AtomicBool,
    sessions: Mutex<Vec<Arc<StubSession>>>,
    callbacks: Mutex<Vec<TerminationCallback>>,
}

#[async_trait]
impl SessionFactory for StubFactory {
    async fn start(
        &self,
        config: &ServerConfig,
        on_terminated: TerminationCallback,
    ) -> Result<Arc<dyn ToolSession>, McpClientError> {
        if self.start_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.start_delay_ms)).await;
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(McpClientError::StartupTimeout {
                name: config.name.clone(),
                timeout_seconds: config.timeout_seconds,
            });
        }
        let session = Arc::new(StubSession {
            name: config.name.clone(),
            shut_down: AtomicBool::new(false),
        });
        self.sessions.lock().unwrap().push(session.clone());
        self.callbacks.lock().unwrap().push(on_terminated);
        Ok(session)
    }
}

fn config(name: &str) -> (String, ServerConfig) {
    let mut server = ServerConfig {
        name: name.to_string(),
        command: "stub".to_string(),
        args: vec![],
        env: BTreeMap::new(),
        timeout_seconds: 5,
        hints: vec![],
        blocked_tools: Default::default(),
        ignore: false,
        overwrite: false,
    };
    server.name = name.to_string();
    (name.to_string(), server)
}

fn supervisor(factory: Arc<StubFactory>, idle_ttl: Duration) -> ServerSupervisor {
    let configs: BTreeMap<String, ServerConfig> = [config("fs"), config("gh")].into();
    ServerSupervisor::new(configs, factory, idle_ttl)
}

#[tokio::test]
async fn lazy_start_on_first_acquire() {
    let factory = Arc::new(StubFactory::default());
    let supervisor = supervisor(factory.clone(), Duration::from_secs(300));

    assert!(supervisor.list_running().is_empty());

    let lease = supervisor.acquire("fs").await.unwrap();
    let result = lease
        .session()
        .call_tool("read_file", None, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(
        result.parts,
        vec![RawPart::Text {
            text: "fs:read_file".into()
        }]
    );
    drop(lease);

    let running = supervisor.list_running();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].server_name, "fs");
    assert_eq!(running[0].state, ServerState::Ready);
    assert_eq!(running[0].in_flight, 0);
    assert_eq!(factory.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_server_is_rejected() {
    let factory = Arc::new(StubFactory::default());
    let supervisor = supervisor(factory, Duration::from_secs(300));
    let err = supervisor.acquire("nope").await.unwrap_err();
    assert!(matches!(err, SupervisorError::UnknownServer(_)));
}

#[tokio::test]
async fn concurrent_acquires_coalesce_into_one_start() {
    let factory = Arc::new(StubFactory {
        start_delay_ms: 50,
        ..Default::default()
    });
    let supervisor = supervisor(factory.clone(), Duration::from_secs(300));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let supervisor = supervisor.clone();
        handles.push(tokio::spawn(async move {
            supervisor.acquire("fs").await.map(drop)
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(factory.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn idle_sessions_are_evicted_but_busy_ones_stay() {
    let factory = Arc::new(StubFactory::default());
    let supervisor = supervisor(factory.clone(), Duration::from_millis(10));

    let busy_lease = supervisor.acquire("gh").await.unwrap();
    drop(supervisor.acquire("fs").await.unwrap());

    tokio::time::sleep(Duration::from_millis(30)).await;
    supervisor.sweep_idle().await;

    let running = supervisor.list_running();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].server_name, "gh");

    let sessions = factory.sessions.lock().unwrap();
    let fs_session = sessions
        .iter()
        .find(|s| s.name == "fs")
        .expect("fs session was started");
    assert!(fs_session.shut_down.load(Ordering::SeqCst));
    drop(sessions);
    drop(busy_lease);
}

#[tokio::test]
async fn explicit_shutdown_stops_the_session() {
    let factory = Arc::new(StubFactory::default());
    let supervisor = supervisor(factory.clone(), Duration::from_secs(300));

    assert!(!supervisor.shutdown("fs").await.unwrap());

    drop(supervisor.acquire("fs").await.unwrap());
    assert!(supervisor.shutdown("fs").await.unwrap());
    assert!(supervisor.list_running().is_empty());

    let sessions = factory.sessions.lock().unwrap();
    assert!(sessions[0].shut_down.load(Ordering::SeqCst));
}

#[tokio::test]
async fn crash_notification_clears_slot_and_next_acquire_restarts() {
    let factory = Arc::new(StubFactory::default());
    let supervisor = supervisor(factory.clone(), Duration::from_secs(300));

    drop(supervisor.acquire("fs").await.unwrap());
    assert_eq!(supervisor.list_running().len(), 1);

    // Simulate the child dying: fire the termination callback the
    // supervisor registered at construction.
    let callback = factory.callbacks.lock().unwrap()[0].clone();
    callback("fs");

    assert!(supervisor.list_running().is_empty());

    drop(supervisor.acquire("fs").await.unwrap());
    assert_eq!(factory.starts.load(Ordering::SeqCst), 2);
    assert_eq!(supervisor.list_running().len(), 1);
}

#[tokio::test]
async fn failed_start_surfaces_error_and_leaves_no_slot() {
    let factory = Arc::new(StubFactory::default());
    factory.fail_next.store(true, Ordering::SeqCst);
    let supervisor = supervisor(factory.clone(), Duration::from_secs(300));

    let err = supervisor.acquire("fs").await.unwrap_err();
    assert!(matches!(err, SupervisorError::Session(_)));
    assert!(supervisor.list_running().is_empty());

    // Next acquire tries again and succeeds.
    drop(supervisor.acquire("fs").await.unwrap());
    assert_eq!(factory.starts.load(Ordering::SeqCst), 2);
}

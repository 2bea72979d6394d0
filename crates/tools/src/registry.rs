//! Tool registry: tracks tool providers and routes tool calls to them.
//!
//! The turn engine uses this to:
//! 1. Get the aggregated tool descriptors to send to the model
//! 2. Resolve a requested tool name to its provider and execute it
//!
//! Each provider's advertised tool names are cached from its most recent
//! listing. Resolution scans those caches in registration order and the
//! first provider claiming a name wins.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use codewright_core::error::ToolError;
use codewright_core::tool::{ToolDescriptor, ToolProvider};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::schema::sanitize_schema;

struct RegisteredProvider {
    name: String,
    provider: Arc<dyn ToolProvider>,
    tool_names: RwLock<Vec<String>>,
}

/// Outcome of [`ToolRegistry::disconnect_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Providers that acknowledged shutdown.
    pub disconnected: Vec<String>,
    /// Providers whose disconnect returned an error.
    pub failed: Vec<String>,
    /// Providers abandoned after the timeout.
    pub timed_out: Vec<String>,
}

/// A registry of tool providers.
#[derive(Default)]
pub struct ToolRegistry {
    providers: Vec<RegisteredProvider>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every tool execution; a call that runs longer fails with
    /// [`ToolError::Timeout`].
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Register a provider under `name`. Providers keep their registration order.
    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn ToolProvider>) {
        let name = name.into();
        if self.providers.iter().any(|p| p.name == name) {
            warn!(provider = %name, "Provider name registered twice; earlier registration wins on tool conflicts");
        }
        self.providers.push(RegisteredProvider {
            name,
            provider,
            tool_names: RwLock::new(Vec::new()),
        });
    }

    /// Connect every registered provider. Failures are logged and returned;
    /// the provider stays registered but unreachable.
    pub async fn connect_all(&self) -> Vec<(String, ToolError)> {
        let mut failures = Vec::new();
        for entry in &self.providers {
            match entry.provider.connect().await {
                Ok(()) => info!(provider = %entry.name, "Tool provider connected"),
                Err(e) => {
                    warn!(provider = %entry.name, error = %e, "Tool provider failed to connect");
                    failures.push((entry.name.clone(), e));
                }
            }
        }
        failures
    }

    /// Aggregate the live tool list of every connected provider.
    ///
    /// Queries each provider on every call and refreshes its cached names.
    /// A provider whose listing fails contributes nothing and keeps its
    /// previous cache. Duplicate names resolve to the earliest provider.
    pub async fn list_all_tools(&self) -> Vec<ToolDescriptor> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();

        for entry in &self.providers {
            if !entry.provider.is_connected() {
                continue;
            }
            let tools = match entry.provider.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(provider = %entry.name, error = %e, "Failed to list tools");
                    continue;
                }
            };

            *entry.tool_names.write().await = tools.iter().map(|t| t.name.clone()).collect();

            for tool in tools {
                if !seen.insert(tool.name.clone()) {
                    warn!(
                        provider = %entry.name,
                        tool = %tool.name,
                        "Duplicate tool name ignored; an earlier provider owns it"
                    );
                    continue;
                }
                let ToolDescriptor { name, description, input_schema } = tool;
                all.push(ToolDescriptor {
                    name,
                    description,
                    input_schema: sanitize_schema(input_schema),
                });
            }
        }

        debug!(tools = all.len(), "Aggregated tool list");
        all
    }

    /// Find the connected provider that owns `tool_name` according to the
    /// cached listings. Disconnected providers are skipped, matching
    /// [`list_all_tools`](Self::list_all_tools).
    pub async fn resolve_provider(&self, tool_name: &str) -> Option<Arc<dyn ToolProvider>> {
        for entry in &self.providers {
            if !entry.provider.is_connected() {
                continue;
            }
            if entry.tool_names.read().await.iter().any(|n| n == tool_name) {
                return Some(Arc::clone(&entry.provider));
            }
        }
        None
    }

    /// Execute a tool on its owning provider.
    ///
    /// If no cached listing claims the name, listings are refreshed once
    /// before giving up with [`ToolError::NotFound`]. Provider failures are
    /// returned as-is; a call exceeding the call timeout is abandoned.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let provider = match self.resolve_provider(tool_name).await {
            Some(p) => p,
            None => {
                self.list_all_tools().await;
                self.resolve_provider(tool_name)
                    .await
                    .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?
            }
        };

        debug!(tool = tool_name, provider = provider.name(), "Dispatching tool call");
        let Some(limit) = self.call_timeout else {
            return provider.execute(tool_name, arguments).await;
        };
        match tokio::time::timeout(limit, provider.execute(tool_name, arguments)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = tool_name, timeout_secs = limit.as_secs(), "Tool call timed out");
                Err(ToolError::Timeout {
                    tool_name: tool_name.to_string(),
                    timeout_secs: limit.as_secs(),
                })
            }
        }
    }

    /// Tear down every provider concurrently, waiting at most `timeout` for each.
    pub async fn disconnect_all(&self, timeout: Duration) -> TeardownReport {
        let teardowns = self.providers.iter().map(|entry| async move {
            let outcome = tokio::time::timeout(timeout, entry.provider.disconnect()).await;
            (entry.name.clone(), outcome)
        });

        let mut report = TeardownReport::default();
        for (name, outcome) in futures::future::join_all(teardowns).await {
            match outcome {
                Ok(Ok(())) => report.disconnected.push(name),
                Ok(Err(e)) => {
                    warn!(provider = %name, error = %e, "Provider disconnect failed");
                    report.failed.push(name);
                }
                Err(_) => {
                    warn!(
                        provider = %name,
                        timeout_ms = timeout.as_millis() as u64,
                        "Provider did not acknowledge shutdown; abandoning"
                    );
                    report.timed_out.push(name);
                }
            }
        }
        report
    }

    /// Registered provider names, in registration order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }

    /// Whether the provider registered under `name` is connected.
    pub fn is_connected(&self, name: &str) -> bool {
        self.providers
            .iter()
            .find(|p| p.name == name)
            .is_some_and(|p| p.provider.is_connected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// A scripted provider with call-count instrumentation.
    struct FakeProvider {
        name: String,
        tools: Mutex<Vec<String>>,
        connected: AtomicBool,
        fail_connect: bool,
        fail_tool: Option<String>,
        disconnect_delay: Option<Duration>,
        execute_delay: Option<Duration>,
        list_calls: AtomicUsize,
        disconnect_effects: AtomicUsize,
    }

    impl FakeProvider {
        fn new(name: &str, tools: &[&str]) -> Self {
            Self {
                name: name.into(),
                tools: Mutex::new(tools.iter().map(|t| t.to_string()).collect()),
                connected: AtomicBool::new(false),
                fail_connect: false,
                fail_tool: None,
                disconnect_delay: None,
                execute_delay: None,
                list_calls: AtomicUsize::new(0),
                disconnect_effects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolProvider for FakeProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&self) -> Result<(), ToolError> {
            if self.fail_connect {
                return Err(ToolError::ConnectionFailed {
                    provider: self.name.clone(),
                    reason: "refused".into(),
                });
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ToolError> {
            if let Some(delay) = self.disconnect_delay {
                tokio::time::sleep(delay).await;
            }
            if self.connected.swap(false, Ordering::SeqCst) {
                self.disconnect_effects.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .tools
                .lock()
                .unwrap()
                .iter()
                .map(|name| ToolDescriptor {
                    name: name.clone(),
                    description: format!("{} from {}", name, self.name),
                    input_schema: json!({"type": "object", "additionalProperties": false}),
                })
                .collect())
        }

        async fn execute(
            &self,
            name: &str,
            arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            if let Some(delay) = self.execute_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_tool.as_deref() == Some(name) {
                return Err(ToolError::ExecutionFailed {
                    tool_name: name.into(),
                    reason: "boom".into(),
                });
            }
            Ok(json!({ "provider": self.name, "tool": name, "args": arguments }))
        }
    }

    async fn connected_registry(providers: Vec<Arc<FakeProvider>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for p in providers {
            registry.register_provider(p.name.clone(), p);
        }
        registry.connect_all().await;
        registry
    }

    #[tokio::test]
    async fn aggregates_and_sanitizes() {
        let fs = Arc::new(FakeProvider::new("filesystem", &["read_file", "list_directory"]));
        let gh = Arc::new(FakeProvider::new("github", &["create_issue"]));
        let registry = connected_registry(vec![fs, gh]).await;

        let tools = registry.list_all_tools().await;
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read_file", "list_directory", "create_issue"]);
        assert!(tools[0].input_schema.get("additionalProperties").is_none());
    }

    #[tokio::test]
    async fn duplicate_tool_resolves_to_first_registered() {
        let first = Arc::new(FakeProvider::new("first", &["search"]));
        let second = Arc::new(FakeProvider::new("second", &["search", "fetch"]));
        let registry = connected_registry(vec![first, second]).await;

        let tools = registry.list_all_tools().await;
        assert_eq!(tools.iter().filter(|t| t.name == "search").count(), 1);
        assert_eq!(tools[0].description, "search from first");

        let out = registry.dispatch("search", json!({})).await.unwrap();
        assert_eq!(out["provider"], "first");
        let out = registry.dispatch("fetch", json!({})).await.unwrap();
        assert_eq!(out["provider"], "second");
    }

    #[tokio::test]
    async fn listing_is_recomputed_per_call() {
        let fs = Arc::new(FakeProvider::new("filesystem", &["read_file"]));
        let registry = connected_registry(vec![Arc::clone(&fs)]).await;

        assert_eq!(registry.list_all_tools().await.len(), 1);
        fs.tools.lock().unwrap().push("write_file".into());
        assert_eq!(registry.list_all_tools().await.len(), 2);
        assert_eq!(fs.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatch_refreshes_once_before_not_found() {
        let fs = Arc::new(FakeProvider::new("filesystem", &["read_file"]));
        let registry = connected_registry(vec![Arc::clone(&fs)]).await;

        // Nothing cached yet: dispatch lists once, then resolves.
        let out = registry.dispatch("read_file", json!({"path": "a"})).await.unwrap();
        assert_eq!(out["args"]["path"], "a");
        assert_eq!(fs.list_calls.load(Ordering::SeqCst), 1);

        let err = registry.dispatch("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nope"));
        assert_eq!(fs.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let mut fake = FakeProvider::new("filesystem", &["read_file"]);
        fake.fail_tool = Some("read_file".into());
        let registry = connected_registry(vec![Arc::new(fake)]).await;

        let err = registry.dispatch("read_file", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn failed_connect_leaves_provider_unreachable() {
        let mut broken = FakeProvider::new("broken", &["secret"]);
        broken.fail_connect = true;
        let ok = Arc::new(FakeProvider::new("ok", &["read_file"]));

        let mut registry = ToolRegistry::new();
        registry.register_provider("broken", Arc::new(broken));
        registry.register_provider("ok", ok);
        let failures = registry.connect_all().await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
        assert_eq!(registry.provider_names(), vec!["broken", "ok"]);
        assert!(!registry.is_connected("broken"));
        assert!(registry.is_connected("ok"));

        let names: Vec<String> = registry.list_all_tools().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["read_file"]);
    }

    #[tokio::test]
    async fn disconnect_all_is_idempotent() {
        let fs = Arc::new(FakeProvider::new("filesystem", &["read_file"]));
        let registry = connected_registry(vec![Arc::clone(&fs)]).await;

        let first = registry.disconnect_all(Duration::from_millis(100)).await;
        let second = registry.disconnect_all(Duration::from_millis(100)).await;

        assert_eq!(first.disconnected, vec!["filesystem"]);
        assert_eq!(second.disconnected, vec!["filesystem"]);
        assert_eq!(fs.disconnect_effects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_is_abandoned() {
        let mut slow = FakeProvider::new("slow", &["a"]);
        slow.disconnect_delay = Some(Duration::from_secs(60));
        let fast = Arc::new(FakeProvider::new("fast", &["b"]));
        let registry = connected_registry(vec![Arc::new(slow), fast]).await;

        let started = tokio::time::Instant::now();
        let report = registry.disconnect_all(Duration::from_millis(500)).await;

        assert_eq!(report.disconnected, vec!["fast"]);
        assert_eq!(report.timed_out, vec!["slow"]);
        assert!(report.failed.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn disconnected_provider_does_not_shadow_live_one() {
        let dead = Arc::new(FakeProvider::new("dead", &["search"]));
        let live = Arc::new(FakeProvider::new("live", &["search"]));
        let registry = connected_registry(vec![Arc::clone(&dead), live]).await;

        // Both caches are populated while everything is connected
        registry.list_all_tools().await;
        dead.disconnect().await.unwrap();

        let tools = registry.list_all_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].description, "search from live");

        let resolved = registry.resolve_provider("search").await.unwrap();
        assert_eq!(resolved.name(), "live");
        let out = registry.dispatch("search", json!({})).await.unwrap();
        assert_eq!(out["provider"], "live");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_call_times_out() {
        let mut slow = FakeProvider::new("slow", &["crawl"]);
        slow.execute_delay = Some(Duration::from_secs(600));
        let registry = connected_registry(vec![Arc::new(slow)])
            .await
            .with_call_timeout(Duration::from_secs(30));

        let err = registry.dispatch("crawl", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Timeout { ref tool_name, timeout_secs: 30 } if tool_name == "crawl"
        ));
    }

    #[tokio::test]
    async fn fast_tool_call_is_unaffected_by_timeout() {
        let fs = Arc::new(FakeProvider::new("filesystem", &["read_file"]));
        let registry = connected_registry(vec![fs])
            .await
            .with_call_timeout(Duration::from_secs(30));

        let out = registry.dispatch("read_file", json!({"path": "a"})).await.unwrap();
        assert_eq!(out["tool"], "read_file");
    }
}

use async_trait::async_trait;
use serde_json::json;
use stackflow_engine::{Declaration, Properties, ProviderError, ResourceProvider};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Behaviour configured for one logical resource
#[derive(Debug, Clone)]
pub enum Script {
    Fail(String),
    FailWithOutputs(String, Properties),
    /// Succeed, but drop the given output key
    Omit(String),
    Panic,
}

/// Recorded provider call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub resource_type: String,
    pub name: String,
    pub inputs: Properties,
}

/// In-memory provider with scripted failures and a call log
///
/// Resources are identified by their `name` input. Outputs echo the inputs
/// and add `id` plus `endpoint`.
#[derive(Default)]
pub struct StubProvider {
    scripts: HashMap<String, Script>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn call_names(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.name)
            .collect()
    }

    /// Highest number of overlapping provider calls observed
    #[allow(dead_code)]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn call(
        &self,
        op: &'static str,
        resource_type: &str,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError> {
        let name = inputs
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(Call {
            op,
            resource_type: resource_type.to_string(),
            name: name.clone(),
            inputs: inputs.clone(),
        });

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let mut outputs = inputs.clone();
        outputs.insert("id".to_string(), json!(format!("{}-{}", resource_type, name)));
        outputs.insert("endpoint".to_string(), json!(format!("{}.internal", name)));

        match self.scripts.get(&name) {
            None => Ok(outputs),
            Some(Script::Fail(message)) => Err(ProviderError::new(message.clone())),
            Some(Script::FailWithOutputs(message, partial)) => {
                Err(ProviderError::new(message.clone()).with_partial_outputs(partial.clone()))
            }
            Some(Script::Omit(key)) => {
                outputs.remove(key);
                Ok(outputs)
            }
            Some(Script::Panic) => panic!("stub provider panicked for {}", name),
        }
    }
}

#[async_trait]
impl ResourceProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn apply(
        &self,
        resource_type: &str,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError> {
        self.call("apply", resource_type, inputs).await
    }

    async fn update(
        &self,
        resource_type: &str,
        _prior_outputs: &Properties,
        inputs: &Properties,
    ) -> Result<Properties, ProviderError> {
        self.call("update", resource_type, inputs).await
    }

    async fn destroy(
        &self,
        resource_type: &str,
        prior_outputs: &Properties,
    ) -> Result<(), ProviderError> {
        self.call("destroy", resource_type, prior_outputs)
            .await
            .map(|_| ())
    }
}

/// Declaration whose `name` input equals its logical name
pub fn resource(name: &str, resource_type: &str) -> Declaration {
    Declaration::new(name, resource_type).with_literal("name", json!(name))
}

/// The sample stack: one server depending on four independent resources
pub fn sample_stack() -> Vec<Declaration> {
    vec![
        resource("my-key", "ssh_key").with_literal("public_key", json!("ssh-ed25519 AAAA")),
        resource("web-server", "vps")
            .with_literal("image", json!("ubuntu-24.04"))
            .with_reference("ssh_key_id", "my-key", "id")
            .with_reference("cache_endpoint", "session-cache", "endpoint")
            .with_reference("database_endpoint", "app-db", "endpoint")
            .with_reference("bucket_id", "assets", "id"),
        resource("session-cache", "cache").with_literal("memory_size_mb", json!(512)),
        resource("app-db", "database").with_literal("engine", json!("postgres")),
        resource("assets", "storage_bucket"),
        resource("assets-key", "storage_access_key"),
    ]
}

//! State management for provisioned resources
//!
//! Manages the `.stackflow/state.json` file which records, per logical name,
//! the inputs last sent to the provider and the outputs it returned. The
//! engine uses it to skip unchanged resources and to find resources that
//! are no longer declared.

use crate::declaration::Properties;
use crate::error::{EngineError, Result};
use crate::report::{EvaluationReport, NodeOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// State of a whole stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by logical name
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for StackState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl StackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, name: String, state: ResourceState) {
        self.resources.insert(name, state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceState> {
        let result = self.resources.remove(name);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources ordered for teardown: highest wave first, then by name
    pub fn teardown_order(&self) -> Vec<(&String, &ResourceState)> {
        let mut ordered: Vec<_> = self.resources.iter().collect();
        ordered.sort_by(|(a_name, a), (b_name, b)| {
            b.wave.cmp(&a.wave).then_with(|| a_name.cmp(b_name))
        });
        ordered
    }

    /// Merge the outcome of an evaluation into this state
    ///
    /// Succeeded nodes are recorded as active. Failed nodes that exposed
    /// outputs are recorded with status `error`; failed nodes without outputs
    /// only flag an existing entry. Skipped nodes leave their entry untouched.
    pub fn apply_report(&mut self, report: &EvaluationReport) {
        let now = Utc::now();
        for result in &report.results {
            let created_at = self
                .resources
                .get(&result.name)
                .filter(|r| r.resource_type == result.resource_type)
                .map(|r| r.created_at)
                .unwrap_or(now);

            match &result.outcome {
                NodeOutcome::Succeeded { outputs } => {
                    self.resources.insert(
                        result.name.clone(),
                        ResourceState {
                            resource_type: result.resource_type.clone(),
                            wave: result.wave,
                            inputs: result.inputs.clone(),
                            outputs: outputs.clone(),
                            status: ResourceStatus::Active,
                            created_at,
                            updated_at: now,
                        },
                    );
                }
                NodeOutcome::Failed { outputs, .. } if !outputs.is_empty() => {
                    self.resources.insert(
                        result.name.clone(),
                        ResourceState {
                            resource_type: result.resource_type.clone(),
                            wave: result.wave,
                            inputs: result.inputs.clone(),
                            outputs: outputs.clone(),
                            status: ResourceStatus::Error,
                            created_at,
                            updated_at: now,
                        },
                    );
                }
                NodeOutcome::Failed { .. } => {
                    if let Some(existing) = self.resources.get_mut(&result.name) {
                        existing.status = ResourceStatus::Error;
                        existing.updated_at = now;
                    }
                }
                NodeOutcome::Skipped { .. } => {}
            }
        }

        for deleted in report.deleted.iter().filter(|d| d.is_success()) {
            self.resources.remove(&deleted.name);
        }

        self.updated_at = now;
    }
}

/// State of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type
    pub resource_type: String,

    /// Wave the resource was last evaluated in
    pub wave: usize,

    /// Resolved inputs last sent to the provider
    pub inputs: Properties,

    /// Outputs returned by the provider (IP, endpoint, etc.)
    pub outputs: Properties,

    /// Current status
    pub status: ResourceStatus,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            resource_type: resource_type.into(),
            wave: 0,
            inputs: Properties::new(),
            outputs: Properties::new(),
            status: ResourceStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_wave(mut self, wave: usize) -> Self {
        self.wave = wave;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }

    pub fn get_output<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.outputs
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Last provider call succeeded
    Active,
    /// Last provider call failed; the resource may be partially provisioned
    Error,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::Error => write!(f, "error"),
        }
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<StackState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StackState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(EngineError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StackState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // stale after one hour
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(EngineError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

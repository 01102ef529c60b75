//! Lifecycle state and its persistence
//!
//! The library worker keeps its state in memory. The `shelf` binary runs
//! each checkpoint in a separate process, so it records the last reached
//! state in `lifecycle.json` next to the partition store.

use crate::error::{ShelfError, ShelfResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker never serves
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    /// States a fresh process may resume from
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Parsed | Self::Installed | Self::Activated | Self::Redundant
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last lifecycle checkpoint reached by the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub state: WorkerState,

    /// Scheme the state was reached under, e.g. `versioned (v2)`
    pub scheme: String,

    /// Partitions written by the last install
    #[serde(default)]
    pub partitions: Vec<String>,

    /// Outcome of an install made while an earlier generation is serving
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<WorkerState>,

    pub updated_at: DateTime<Utc>,
}

impl LifecycleRecord {
    pub fn new(state: WorkerState, scheme: impl Into<String>) -> Self {
        Self {
            state,
            scheme: scheme.into(),
            partitions: vec![],
            pending: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_serving(&self) -> bool {
        self.state == WorkerState::Activated
    }

    /// State the next `activate` resumes from: a pending install, if any
    pub fn activation_state(&self) -> WorkerState {
        self.pending.unwrap_or(self.state)
    }

    /// Record an install outcome without giving up the serving state
    pub fn with_pending(mut self, outcome: WorkerState, partitions: Vec<String>) -> Self {
        self.pending = Some(outcome);
        if outcome == WorkerState::Installed {
            self.partitions = partitions;
        }
        self.updated_at = Utc::now();
        self
    }

    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join("lifecycle.json")
    }

    /// Load the record from `dir`, if one was saved
    pub async fn load(dir: &Path) -> ShelfResult<Option<Self>> {
        let path = Self::file_path(dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ShelfError::io(format!("reading lifecycle file {}", path.display()), e))?;

        let record = serde_json::from_str(&content).map_err(|e| ShelfError::StoreCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }

    pub async fn save(&self, dir: &Path) -> ShelfResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ShelfError::io(format!("creating {}", dir.display()), e))?;

        let path = Self::file_path(dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .map_err(|e| ShelfError::io(format!("writing lifecycle file {}", path.display()), e))?;
        Ok(())
    }
}

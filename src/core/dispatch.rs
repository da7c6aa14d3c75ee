//! Assignment of external work items (issue keys) to target hosts.
//!
//! The store is shared between interactive readers and background writers,
//! so every operation goes through its lock. Persistence is explicit: call
//! [`DispatchStore::save`] after mutating.

use super::error::StoreError;
use super::persist::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Done => "done",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "in-progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            "failed" => Ok(Status::Failed),
            other => Err(format!("unknown status {:?}", other)),
        }
    }
}

/// Links an issue to a host or agent. At most one exists per
/// (`issue_key`, `target`) pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    /// e.g. "PROJ-123"
    pub issue_key: String,
    pub summary: String,
    /// hostname, IP, or agent name
    pub target: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub fn assignment_id(issue_key: &str, target: &str) -> String {
    format!("{}→{}", issue_key, target)
}

#[derive(Serialize, Deserialize, Default)]
struct StoreFile {
    assignments: Vec<Assignment>,
}

pub struct DispatchStore {
    path: PathBuf,
    inner: RwLock<StoreFile>,
}

impl DispatchStore {
    /// Opens the store at `path`. A missing file is an empty store; a
    /// malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<DispatchStore, StoreError> {
        let path = path.into();
        let inner = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(DispatchStore {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// `~/.pulse/dispatch.json`
    pub fn default_path() -> PathBuf {
        crate::config::state_dir().join("dispatch.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreFile> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreFile> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a pending assignment, replacing any existing one for the same
    /// issue and target.
    pub fn assign(&self, issue_key: &str, summary: &str, target: &str) -> Assignment {
        let now = Utc::now();
        let a = Assignment {
            id: assignment_id(issue_key, target),
            issue_key: issue_key.to_string(),
            summary: summary.to_string(),
            target: target.to_string(),
            status: Status::Pending,
            created_at: now,
            updated_at: now,
            note: None,
        };
        let mut inner = self.write();
        match inner
            .assignments
            .iter()
            .position(|e| e.issue_key == issue_key && e.target == target)
        {
            Some(idx) => inner.assignments[idx] = a.clone(),
            None => inner.assignments.push(a.clone()),
        }
        a
    }

    pub fn update_status(&self, id: &str, status: Status, note: Option<String>) -> Result<(), StoreError> {
        let mut inner = self.write();
        let a = inner
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        a.status = status;
        a.note = note.filter(|n| !n.is_empty());
        a.updated_at = Utc::now();
        Ok(())
    }

    pub fn for_target(&self, target: &str) -> Vec<Assignment> {
        self.read()
            .assignments
            .iter()
            .filter(|a| a.target == target)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Assignment> {
        self.read().assignments.clone()
    }

    pub fn remove(&self, id: &str) -> Result<Assignment, StoreError> {
        let mut inner = self.write();
        let idx = inner
            .assignments
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(inner.assignments.remove(idx))
    }

    /// Writes the whole store to its file, replacing the previous content
    /// atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        let inner = self.read();
        let data = serde_json::to_vec_pretty(&*inner)?;
        write_atomic(&self.path, &data)?;
        info!("saved {} assignments to {}", inner.assignments.len(), self.path.display());
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use hifitime::{Duration, Epoch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::environment::Environment;

/// Something an activity used or produced, usually a file path. It is never
/// checked that the referenced thing exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub url: String,

    /// What the entity is to the activity, e.g. "DL1/Event".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl EntityRef {
    pub fn new(url: impl Into<String>) -> EntityRef {
        EntityRef {
            url: url.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> EntityRef {
        self.role = Some(role.into());
        self
    }
}

impl From<&str> for EntityRef {
    fn from(url: &str) -> Self {
        EntityRef::new(url)
    }
}

impl From<String> for EntityRef {
    fn from(url: String) -> Self {
        EntityRef::new(url)
    }
}

impl From<&Path> for EntityRef {
    fn from(path: &Path) -> Self {
        EntityRef::new(path.display().to_string())
    }
}

impl From<PathBuf> for EntityRef {
    fn from(path: PathBuf) -> Self {
        EntityRef::from(path.as_path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Running,
    Completed,
    Error,
}

impl ActivityStatus {
    /// Finished activities never run again.
    pub fn is_finished(self) -> bool {
        !matches!(self, ActivityStatus::Running)
    }
}

/// How a finished activity ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    Completed,
    Error,
}

impl From<FinalStatus> for ActivityStatus {
    fn from(status: FinalStatus) -> Self {
        match status {
            FinalStatus::Completed => ActivityStatus::Completed,
            FinalStatus::Error => ActivityStatus::Error,
        }
    }
}

/// A unit of work tracked by [`Provenance`](super::Provenance).
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) status: ActivityStatus,
    pub(super) start: Epoch,
    pub(super) stop: Option<Epoch>,
    pub(super) inputs: Vec<EntityRef>,
    pub(super) outputs: Vec<EntityRef>,
    /// The IDs of activities started while this one was on top of the stack.
    pub(super) children: Vec<Uuid>,
    pub(super) config: Option<serde_json::Value>,
    pub(super) environment: Environment,
}

impl ActivityRecord {
    pub(super) fn running(name: String, start: Epoch, environment: Environment) -> ActivityRecord {
        ActivityRecord {
            id: Uuid::new_v4(),
            name,
            status: ActivityStatus::Running,
            start,
            stop: None,
            inputs: vec![],
            outputs: vec![],
            children: vec![],
            config: None,
            environment,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn start_time(&self) -> Epoch {
        self.start
    }

    /// `None` until the activity finishes.
    pub fn stop_time(&self) -> Option<Epoch> {
        self.stop
    }

    pub fn duration(&self) -> Option<Duration> {
        self.stop.map(|stop| stop - self.start)
    }

    pub fn inputs(&self) -> &[EntityRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[EntityRef] {
        &self.outputs
    }

    pub fn children(&self) -> &[Uuid] {
        &self.children
    }

    pub fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }
}

//! Provenance tracking: which activities ran, when, on what, producing what,
//! and in which environment.
//!
//! A [`Provenance`] keeps a stack of running activities and an append-only
//! list of finished ones. Activities nest like call scopes: inputs and
//! outputs are attached to the innermost running activity, and an activity
//! can only finish once everything it started has finished.
//!
//! There is no global tracker. Create one per process (or per test) and pass
//! it to whatever needs to record provenance. It is not synchronised; share
//! it between threads only behind a lock.

mod activity;
mod document;
mod environment;
mod error;


pub use activity::{ActivityRecord, ActivityStatus, EntityRef, FinalStatus};
pub use document::{ActivityDocument, ProvDocument, TimeDocument};
pub use environment::{
    Clock, Environment, EnvironmentProvider, ManualClock, StaticEnvironment, SystemClock,
    SystemEnvironment, DEFAULT_ENVIRONMENT_VARIABLES,
};
pub use error::{ProvenanceError, Result};

use std::{fmt, path::Path};

use log::{debug, trace};
use uuid::Uuid;

pub struct Provenance {
    clock: Box<dyn Clock>,
    environment: Box<dyn EnvironmentProvider>,

    /// Running activities; the last one is the current activity.
    active: Vec<ActivityRecord>,

    /// Snapshots of finished activities, in the order they finished.
    finished: Vec<ActivityRecord>,
}

impl Provenance {
    /// A tracker using the system clock and describing the running process.
    pub fn new() -> Provenance {
        Provenance::with_collaborators(
            Box::new(SystemClock),
            Box::new(SystemEnvironment::default()),
        )
    }

    pub fn with_collaborators(
        clock: Box<dyn Clock>,
        environment: Box<dyn EnvironmentProvider>,
    ) -> Provenance {
        Provenance {
            clock,
            environment,
            active: vec![],
            finished: vec![],
        }
    }

    /// Start a new activity nested inside the current one (if any), and make
    /// it the current activity.
    pub fn start_activity(&mut self, name: impl Into<String>) -> Uuid {
        let name = name.into();
        let record = ActivityRecord::running(name, self.clock.now(), self.environment.capture());
        debug!("Started activity '{}' ({})", record.name, record.id);
        if let Some(parent) = self.active.last_mut() {
            trace!("'{}' is a child of '{}'", record.name, parent.name);
            parent.children.push(record.id);
        }
        let id = record.id;
        self.active.push(record);
        id
    }

    fn current_mut(&mut self, operation: &'static str) -> Result<&mut ActivityRecord> {
        self.active
            .last_mut()
            .ok_or(ProvenanceError::NoActiveActivity { operation })
    }

    /// Record that the current activity used `entity`.
    pub fn add_input_entity(&mut self, entity: impl Into<EntityRef>) -> Result<()> {
        let entity = entity.into();
        let current = self.current_mut("add an input entity")?;
        trace!("'{}' used {}", current.name, entity.url);
        current.inputs.push(entity);
        Ok(())
    }

    /// Record that the current activity produced `entity`.
    pub fn add_output_entity(&mut self, entity: impl Into<EntityRef>) -> Result<()> {
        let entity = entity.into();
        let current = self.current_mut("add an output entity")?;
        trace!("'{}' generated {}", current.name, entity.url);
        current.outputs.push(entity);
        Ok(())
    }

    pub fn add_input_file(&mut self, path: impl AsRef<Path>, role: Option<&str>) -> Result<()> {
        self.add_input_entity(file_entity(path.as_ref(), role))
    }

    pub fn add_output_file(&mut self, path: impl AsRef<Path>, role: Option<&str>) -> Result<()> {
        self.add_output_entity(file_entity(path.as_ref(), role))
    }

    /// Attach the configuration of the current activity, replacing any
    /// previously attached configuration.
    pub fn add_config(&mut self, config: serde_json::Value) -> Result<()> {
        self.current_mut("add a configuration")?.config = Some(config);
        Ok(())
    }

    /// Finish the current activity successfully. If `name` is given, it must
    /// be the name of the current activity.
    pub fn finish_activity(&mut self, name: Option<&str>) -> Result<&ActivityRecord> {
        self.finish_activity_with_status(name, FinalStatus::Completed)
    }

    /// Finish the current activity, recording how it ended. On error,
    /// nothing changes.
    pub fn finish_activity_with_status(
        &mut self,
        name: Option<&str>,
        status: FinalStatus,
    ) -> Result<&ActivityRecord> {
        let top = self
            .active
            .len()
            .checked_sub(1)
            .ok_or(ProvenanceError::NoActiveActivity {
                operation: "finish an activity",
            })?;
        if let Some(name) = name {
            if name != self.active[top].name {
                return Err(ProvenanceError::StackMismatch {
                    expected: name.to_string(),
                    found: self.active[top].name.clone(),
                });
            }
        }

        let stop = self.clock.now();
        let mut record = self.active.remove(top);
        record.stop = Some(stop);
        record.status = status.into();
        debug!(
            "Finished activity '{}' ({:?}) after {}",
            record.name,
            record.status,
            stop - record.start
        );
        self.finished.push(record);
        Ok(&self.finished[self.finished.len() - 1])
    }

    /// The innermost running activity.
    pub fn current_activity(&self) -> Option<&ActivityRecord> {
        self.active.last()
    }

    /// Names of running activities, outermost first.
    pub fn active_activity_names(&self) -> Vec<&str> {
        self.active.iter().map(ActivityRecord::name).collect()
    }

    /// Names of finished activities, in the order they finished.
    pub fn finished_activity_names(&self) -> Vec<&str> {
        self.finished.iter().map(ActivityRecord::name).collect()
    }

    pub fn finished_activities(&self) -> &[ActivityRecord] {
        &self.finished
    }

    /// Forget everything, running activities included.
    pub fn clear(&mut self) {
        debug!(
            "Clearing provenance ({} running, {} finished activities)",
            self.active.len(),
            self.finished.len()
        );
        self.active.clear();
        self.finished.clear();
    }

    pub fn as_document(&self) -> ProvDocument {
        ProvDocument::from_records(&self.finished)
    }

    pub fn as_json(&self, indent: Option<usize>) -> Result<String> {
        self.as_document().to_json(indent)
    }

    /// Write the finished activities to `path` as JSON.
    pub fn write_json(&self, path: impl AsRef<Path>, indent: Option<usize>) -> Result<()> {
        let path = path.as_ref();
        debug!("Writing provenance to {}", path.display());
        std::fs::write(path, self.as_json(indent)?)?;
        Ok(())
    }
}

fn file_entity(path: &Path, role: Option<&str>) -> EntityRef {
    let entity = EntityRef::from(path);
    match role {
        Some(role) => entity.with_role(role),
        None => entity,
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Provenance::new()
    }
}

impl fmt::Debug for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provenance")
            .field("active", &self.active)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

//! Decides when the live project is written to, and read from, the store.

use crate::autosave::{AutosaveQueue, PendingWrite};
use crate::clock::{Clock, Tick};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use webdaw_graph::{IdAllocator, Project, ProjectMetadata, SynthRegistry};
use webdaw_project::{DecodedProject, Encoding, ProjectError, encode, load_project, to_bytes};
use webdaw_store::{AUTOSAVE_KEY, Partition, Store, StoreError};

/// Name given to the empty project created at first boot.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceOptions {
    /// Quiet period after the last edit before an autosave is written
    pub debounce_ms: u64,
    pub encoding: Encoding,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 1500,
            encoding: Encoding::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Loading,
    Ready,
}

/// Where a project is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSlot {
    Autosave,
    Named(String),
}

impl ProjectSlot {
    /// `"autosave"` names the autosave slot; anything else is a project name.
    pub fn parse(name: &str) -> Self {
        if name == Partition::Autosave.name() {
            ProjectSlot::Autosave
        } else {
            ProjectSlot::Named(name.to_string())
        }
    }

    /// Partition and key the slot is stored under.
    pub fn location(&self) -> (Partition, &str) {
        match self {
            ProjectSlot::Autosave => (Partition::Autosave, AUTOSAVE_KEY),
            ProjectSlot::Named(name) => (Partition::Projects, name.as_str()),
        }
    }
}

impl std::fmt::Display for ProjectSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectSlot::Autosave => f.write_str("autosave"),
            ProjectSlot::Named(name) => write!(f, "project '{name}'"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Project error: {0}")]
    Project(#[from] ProjectError),

    #[error("nothing saved in {slot}")]
    NotFound { slot: ProjectSlot },

    #[error("project name must not be empty or \"autosave\"")]
    InvalidName,

    #[error("persistence has not finished booting")]
    NotReady,
}

/// A problem the user should hear about that did not stop the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceWarning {
    /// The autosave record could not be decoded at boot; an empty project was opened
    RecoveryFailed { reason: String },
    /// The store could not be reached; edits are kept in memory only
    StoreUnavailable { reason: String },
    /// An autosave write failed and will be retried
    AutosaveFailed { reason: String },
}

impl std::fmt::Display for PersistenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceWarning::RecoveryFailed { reason } => {
                write!(f, "could not recover the autosaved project: {reason}")
            }
            PersistenceWarning::StoreUnavailable { reason } => {
                write!(f, "storage unavailable, changes are kept in memory: {reason}")
            }
            PersistenceWarning::AutosaveFailed { reason } => {
                write!(f, "autosave failed, will retry: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    /// The autosaved project was restored
    Recovered,
    /// Started with an empty project
    Fresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Written { revision: u64 },
    Failed,
}

/// Owns the live project and every read or write of it.
///
/// Edits go through [`PersistenceController::edit`] (or are reported with
/// [`PersistenceController::notify_mutation`]) and arm a debounce timer.
/// The host calls [`PersistenceController::poll`] regularly; once the timer
/// expires the project is encoded and written to the autosave slot.
pub struct PersistenceController {
    store: Arc<dyn Store>,
    registry: Arc<dyn SynthRegistry + Send + Sync>,
    clock: Arc<dyn Clock>,
    options: PersistenceOptions,
    state: ControllerState,
    project: Project,
    ids: IdAllocator,
    /// Bumped on every mutation
    revision: u64,
    /// Revision at which `last_modified` was last stamped by a save
    stamped_revision: u64,
    autosave: AutosaveQueue,
    warnings: Vec<PersistenceWarning>,
}

impl PersistenceController {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<dyn SynthRegistry + Send + Sync>,
        clock: Arc<dyn Clock>,
        options: PersistenceOptions,
    ) -> Self {
        let project = Project::new(DEFAULT_PROJECT_NAME, clock.now());
        Self {
            store,
            registry,
            clock,
            options,
            state: ControllerState::Idle,
            project,
            ids: IdAllocator::new(),
            revision: 0,
            stamped_revision: 0,
            autosave: AutosaveQueue::new(options.debounce_ms),
            warnings: Vec::new(),
        }
    }

    /// Restore the autosaved project, or start empty. Always ends `Ready`.
    pub async fn boot(&mut self) -> BootOutcome {
        self.state = ControllerState::Loading;

        let outcome = match self.store.read(Partition::Autosave, AUTOSAVE_KEY).await {
            Ok(Some(bytes)) => match load_project(&bytes, self.registry.as_ref()) {
                Ok(decoded) => {
                    log::info!("recovered autosaved project '{}'", decoded.project.name());
                    self.adopt(decoded);
                    BootOutcome::Recovered
                }
                Err(e) => {
                    self.warn(PersistenceWarning::RecoveryFailed {
                        reason: e.to_string(),
                    });
                    self.start_fresh(DEFAULT_PROJECT_NAME);
                    BootOutcome::Fresh
                }
            },
            Ok(None) => {
                log::info!("no autosave found, starting a new project");
                self.start_fresh(DEFAULT_PROJECT_NAME);
                BootOutcome::Fresh
            }
            Err(e) => {
                self.warn(PersistenceWarning::StoreUnavailable {
                    reason: e.to_string(),
                });
                self.start_fresh(DEFAULT_PROJECT_NAME);
                BootOutcome::Fresh
            }
        };

        self.state = ControllerState::Ready;
        outcome
    }

    /// Apply an edit to the live project and schedule an autosave.
    pub fn edit<R>(
        &mut self,
        now: Tick,
        f: impl FnOnce(&mut Project, &mut IdAllocator) -> R,
    ) -> R {
        let result = f(&mut self.project, &mut self.ids);
        self.notify_mutation(now);
        result
    }

    /// Record that the live project changed.
    pub fn notify_mutation(&mut self, now: Tick) {
        self.revision += 1;
        self.autosave.arm(now);
    }

    /// Write the autosave if its debounce window has elapsed.
    pub async fn poll(&mut self, now: Tick) -> Option<AutosaveOutcome> {
        if self.state != ControllerState::Ready {
            return None;
        }
        if self.autosave.is_due(now) {
            self.autosave.disarm();
            self.enqueue_autosave();
        }
        self.drain_autosave(now).await
    }

    /// Write any pending autosave now, ignoring the debounce window.
    pub async fn flush(&mut self, now: Tick) -> Option<AutosaveOutcome> {
        if self.state != ControllerState::Ready {
            return None;
        }
        if self.autosave.is_armed() {
            self.autosave.disarm();
            self.enqueue_autosave();
        }
        self.drain_autosave(now).await
    }

    /// Save the live project under `name` in the projects partition.
    ///
    /// The live project takes the new name once the write succeeds. The
    /// autosave slot is left alone.
    pub async fn save_as(&mut self, name: impl Into<String>) -> Result<(), PersistenceError> {
        self.ensure_ready()?;
        let name = name.into();
        check_name(&name)?;

        let write = self.prepare(&name)?;
        self.store
            .write(Partition::Projects, &name, write.bytes)
            .await?;

        log::info!("saved project '{name}'");
        self.project.metadata.name = name;
        self.mark_saved(write.revision, write.stamp);
        Ok(())
    }

    /// Replace the live project with an empty one called `name`.
    ///
    /// Any pending autosave of the old project is dropped and a snapshot of
    /// the new one is queued. ID counters carry on from where they were.
    pub fn new_project(&mut self, name: impl Into<String>) -> Result<(), PersistenceError> {
        self.ensure_ready()?;
        let name = name.into();
        check_name(&name)?;

        self.autosave.cancel();
        self.start_fresh(name);
        log::info!("started new project '{}'", self.project.name());
        self.enqueue_autosave();
        Ok(())
    }

    /// Save the live project under its current name.
    pub async fn save(&mut self) -> Result<(), PersistenceError> {
        let name = self.project.metadata.name.clone();
        self.save_as(name).await
    }

    /// Replace the live project with a stored one.
    ///
    /// The live project is only swapped after the record has been read and
    /// decoded; on any error it is left exactly as it was.
    pub async fn load(&mut self, slot: ProjectSlot) -> Result<(), PersistenceError> {
        self.ensure_ready()?;
        let (partition, key) = slot.location();
        let bytes = self
            .store
            .read(partition, key)
            .await?
            .ok_or_else(|| PersistenceError::NotFound { slot: slot.clone() })?;
        let decoded = load_project(&bytes, self.registry.as_ref())?;

        // A snapshot of the old project must not land after the swap.
        self.autosave.cancel();
        self.adopt(decoded);
        log::info!("loaded {slot}");

        if matches!(slot, ProjectSlot::Named(_)) {
            // Crash recovery should reopen the project the user is now working on.
            self.enqueue_autosave();
        }
        Ok(())
    }

    pub async fn list_projects(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.store.list(Partition::Projects).await?)
    }

    pub async fn delete_project(&self, name: &str) -> Result<(), PersistenceError> {
        self.store.delete(Partition::Projects, name).await?;
        log::info!("deleted project '{name}'");
        Ok(())
    }

    pub fn current_metadata(&self) -> &ProjectMetadata {
        &self.project.metadata
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// True while an autosave is armed, queued or being written.
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// Warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<PersistenceWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn ensure_ready(&self) -> Result<(), PersistenceError> {
        match self.state {
            ControllerState::Ready => Ok(()),
            _ => Err(PersistenceError::NotReady),
        }
    }

    fn warn(&mut self, warning: PersistenceWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn start_fresh(&mut self, name: impl Into<String>) {
        self.project = Project::new(name, self.clock.now());
        self.revision += 1;
        self.stamped_revision = self.revision;
    }

    fn adopt(&mut self, decoded: DecodedProject) {
        self.project = decoded.project;
        self.ids.raise_to(&decoded.ids);
        self.revision += 1;
        self.stamped_revision = self.revision;
    }

    /// Encode the live project for writing under `name`.
    ///
    /// `last_modified` only moves when the project changed since it was last
    /// stamped or is being renamed, so saving an unchanged project twice
    /// produces identical bytes.
    fn prepare(&self, name: &str) -> Result<PendingWrite, ProjectError> {
        let dirty =
            self.revision != self.stamped_revision || self.project.metadata.name != name;
        let stamp: DateTime<Utc> = if dirty {
            self.clock.now()
        } else {
            self.project.metadata.last_modified
        };

        let mut file = encode(&self.project, &self.ids);
        file.metadata.name = name.to_string();
        file.metadata.last_modified = stamp;

        Ok(PendingWrite {
            revision: self.revision,
            stamp,
            bytes: to_bytes(&file, self.options.encoding)?,
        })
    }

    fn mark_saved(&mut self, revision: u64, stamp: DateTime<Utc>) {
        if revision == self.revision {
            self.project.metadata.last_modified = stamp;
            self.stamped_revision = revision;
        }
    }

    fn enqueue_autosave(&mut self) {
        let name = self.project.metadata.name.clone();
        match self.prepare(&name) {
            Ok(write) => {
                self.autosave.enqueue(write);
            }
            Err(e) => self.warn(PersistenceWarning::AutosaveFailed {
                reason: e.to_string(),
            }),
        }
    }

    async fn drain_autosave(&mut self, now: Tick) -> Option<AutosaveOutcome> {
        let (write, in_flight) = self.autosave.start_write(now)?;
        let result = self
            .store
            .write(Partition::Autosave, AUTOSAVE_KEY, write.bytes)
            .await;
        in_flight.complete();

        match result {
            Ok(()) => {
                log::debug!("autosaved revision {}", write.revision);
                self.mark_saved(write.revision, write.stamp);
                Some(AutosaveOutcome::Written {
                    revision: write.revision,
                })
            }
            Err(e) => {
                self.warn(PersistenceWarning::AutosaveFailed {
                    reason: e.to_string(),
                });
                // Retry on the next debounce cycle with whatever the project is then.
                self.autosave.arm(now);
                Some(AutosaveOutcome::Failed)
            }
        }
    }
}

/// Names that can be saved under and opened again.
fn check_name(name: &str) -> Result<(), PersistenceError> {
    if name.trim().is_empty() || ProjectSlot::parse(name) == ProjectSlot::Autosave {
        return Err(PersistenceError::InvalidName);
    }
    Ok(())
}

//! Dashboard state machine.
//!
//! The dashboard owns one store per resource and never performs I/O itself.
//! Gestures return [`DashCommand`]s for a runtime to execute; the runtime
//! feeds the results back as [`DashEvent`]s through [`Dashboard::apply`].

use crate::lastrun::{LastRunKey, LastRunQuery, LastRunRecord, Page};
use crate::store::ResourceStore;
use crate::sync::{self, FetchTicket, Resolution};
use crate::{LastHeight, MutationOutcome, NewTaskRequest, Task, DEFAULT_PAGE_LIMIT};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tasks,
    LastRuns,
    LastHeights,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Tasks => "tasks",
            Resource::LastRuns => "last_runs",
            Resource::LastHeights => "last_heights",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// `schedule_id` is what the endpoint addresses, `task_id` is for display.
    Enable { schedule_id: String, task_id: String },
    Disable { schedule_id: String, task_id: String },
    Delete { task_id: String },
    Add(NewTaskRequest),
}

impl Mutation {
    pub fn enable(task: &Task) -> Self {
        Mutation::Enable {
            schedule_id: task.schedule_ref().to_string(),
            task_id: task.task_id.clone(),
        }
    }

    pub fn disable(task: &Task) -> Self {
        Mutation::Disable {
            schedule_id: task.schedule_ref().to_string(),
            task_id: task.task_id.clone(),
        }
    }

    /// Enable when currently disabled and vice versa.
    pub fn toggle(task: &Task) -> Self {
        if task.enabled {
            Self::disable(task)
        } else {
            Self::enable(task)
        }
    }

    pub fn delete(task: &Task) -> Self {
        Mutation::Delete {
            task_id: task.task_id.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Enable { .. } => "enable",
            Mutation::Disable { .. } => "disable",
            Mutation::Delete { .. } => "delete",
            Mutation::Add(_) => "add",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Mutation::Enable { task_id, .. }
            | Mutation::Disable { task_id, .. }
            | Mutation::Delete { task_id } => task_id,
            Mutation::Add(request) => &request.task_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} {task_id} is still in flight")]
pub struct MutationBusy {
    pub label: &'static str,
    pub task_id: String,
}

pub type LastRunTicket = FetchTicket<Option<LastRunQuery>>;

/// Work the runtime must perform on the dashboard's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashCommand {
    FetchTasks(FetchTicket),
    FetchLastRuns {
        ticket: LastRunTicket,
        query: LastRunQuery,
    },
    FetchLastHeights(FetchTicket),
    Mutate(Mutation),
}

/// Results flowing back from the runtime.
#[derive(Debug, Clone)]
pub enum DashEvent {
    TasksLoaded {
        ticket: FetchTicket,
        result: Result<Vec<Task>, String>,
    },
    LastRunsLoaded {
        ticket: LastRunTicket,
        result: Result<Vec<LastRunRecord>, String>,
    },
    LastHeightsLoaded {
        ticket: FetchTicket,
        result: Result<Vec<LastHeight>, String>,
    },
    MutationSettled {
        mutation: Mutation,
        result: Result<MutationOutcome, String>,
    },
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    tasks: ResourceStore<Task>,
    last_runs: ResourceStore<LastRunRecord, Option<LastRunQuery>>,
    last_heights: ResourceStore<LastHeight>,
    auto_refresh: bool,
    pending_mutation: Option<Mutation>,
    tasks_resync_pending: bool,
    page_size: u64,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT)
    }
}

impl Dashboard {
    pub fn new(page_size: u64) -> Self {
        Self {
            tasks: ResourceStore::new(),
            last_runs: ResourceStore::default(),
            last_heights: ResourceStore::new(),
            auto_refresh: false,
            pending_mutation: None,
            tasks_resync_pending: false,
            page_size: page_size.max(1),
        }
    }

    pub fn tasks(&self) -> &ResourceStore<Task> {
        &self.tasks
    }

    pub fn last_runs(&self) -> &ResourceStore<LastRunRecord, Option<LastRunQuery>> {
        &self.last_runs
    }

    pub fn last_heights(&self) -> &ResourceStore<LastHeight> {
        &self.last_heights
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn pending_mutation(&self) -> Option<&Mutation> {
        self.pending_mutation.as_ref()
    }

    pub fn selection(&self) -> Option<&LastRunKey> {
        self.last_runs.key().as_ref().map(|query| &query.key)
    }

    pub fn page(&self) -> Option<Page> {
        self.last_runs.key().as_ref().map(|query| query.page)
    }

    /// Initial synchronization of the global resources.
    pub fn start(&mut self) -> Vec<DashCommand> {
        [Resource::Tasks, Resource::LastHeights]
            .into_iter()
            .filter_map(|resource| self.sync(resource))
            .collect()
    }

    /// Runs the synchronization controller against one store.
    pub fn sync(&mut self, resource: Resource) -> Option<DashCommand> {
        match resource {
            Resource::Tasks => sync::begin(&mut self.tasks).map(DashCommand::FetchTasks),
            Resource::LastHeights => {
                sync::begin(&mut self.last_heights).map(DashCommand::FetchLastHeights)
            }
            Resource::LastRuns => {
                let query = self.last_runs.key().clone()?;
                sync::begin(&mut self.last_runs)
                    .map(|ticket| DashCommand::FetchLastRuns { ticket, query })
            }
        }
    }

    /// Refresh gesture: invalidate, then synchronize.
    pub fn refresh(&mut self, resource: Resource) -> Option<DashCommand> {
        match resource {
            Resource::Tasks => self.tasks.mark_invalid(),
            Resource::LastRuns => self.last_runs.mark_invalid(),
            Resource::LastHeights => self.last_heights.mark_invalid(),
        }
        self.sync(resource)
    }

    /// Points the run log at `task`. Reselecting the current task keeps its page.
    pub fn select_task(&mut self, task: &Task) -> Option<DashCommand> {
        let key = LastRunKey::from_task(task);
        if self.selection() != Some(&key) {
            self.last_runs
                .select(Some(LastRunQuery::new(key, Page::first(self.page_size))));
        }
        self.sync(Resource::LastRuns)
    }

    pub fn clear_selection(&mut self) {
        self.last_runs.select(None);
    }

    pub fn next_page(&mut self) -> Option<DashCommand> {
        self.turn_page(Page::next)
    }

    pub fn prev_page(&mut self) -> Option<DashCommand> {
        self.turn_page(Page::prev)
    }

    fn turn_page(&mut self, step: fn(Page) -> Page) -> Option<DashCommand> {
        let current = self.last_runs.key().clone()?;
        let page = step(current.page);
        if page == current.page {
            return None;
        }
        self.last_runs.select(Some(LastRunQuery::new(current.key, page)));
        self.sync(Resource::LastRuns)
    }

    pub fn toggle_auto_refresh(&mut self) -> bool {
        self.auto_refresh = !self.auto_refresh;
        self.auto_refresh
    }

    /// Periodic tick: re-fetches the selected run log when auto-refresh is on.
    pub fn on_auto_refresh_tick(&mut self) -> Option<DashCommand> {
        if !self.auto_refresh || self.last_runs.key().is_none() {
            return None;
        }
        self.refresh(Resource::LastRuns)
    }

    pub fn request_mutation(&mut self, mutation: Mutation) -> Result<DashCommand, MutationBusy> {
        if let Some(pending) = &self.pending_mutation {
            return Err(MutationBusy {
                label: pending.label(),
                task_id: pending.task_id().to_string(),
            });
        }
        info!(
            event = "mutation_requested",
            kind = mutation.label(),
            task_id = mutation.task_id()
        );
        self.pending_mutation = Some(mutation.clone());
        Ok(DashCommand::Mutate(mutation))
    }

    /// Folds a runtime result into the stores, returning follow-up work.
    pub fn apply(&mut self, event: DashEvent) -> Vec<DashCommand> {
        match event {
            DashEvent::TasksLoaded { ticket, result } => {
                let resolution = resolve_logged(Resource::Tasks, &mut self.tasks, &ticket, result);
                if resolution != Resolution::Stale && self.tasks_resync_pending {
                    self.tasks_resync_pending = false;
                    return self.refresh(Resource::Tasks).into_iter().collect();
                }
                Vec::new()
            }
            DashEvent::LastRunsLoaded { ticket, result } => {
                resolve_logged(Resource::LastRuns, &mut self.last_runs, &ticket, result);
                Vec::new()
            }
            DashEvent::LastHeightsLoaded { ticket, result } => {
                resolve_logged(
                    Resource::LastHeights,
                    &mut self.last_heights,
                    &ticket,
                    result,
                );
                Vec::new()
            }
            DashEvent::MutationSettled { mutation, result } => {
                self.settle_mutation(mutation, result)
            }
        }
    }

    fn settle_mutation(
        &mut self,
        mutation: Mutation,
        result: Result<MutationOutcome, String>,
    ) -> Vec<DashCommand> {
        if self.pending_mutation.as_ref() == Some(&mutation) {
            self.pending_mutation = None;
        }

        let status = match result {
            Ok(MutationOutcome::Applied) => {
                info!(
                    event = "mutation_applied",
                    kind = mutation.label(),
                    task_id = mutation.task_id()
                );
                None
            }
            Ok(MutationOutcome::Rejected(message)) => {
                warn!(
                    event = "mutation_rejected",
                    kind = mutation.label(),
                    task_id = mutation.task_id(),
                    message = %message
                );
                Some(message)
            }
            Err(err) => {
                warn!(
                    event = "mutation_failed",
                    kind = mutation.label(),
                    task_id = mutation.task_id(),
                    error = %err
                );
                Some(format!("{} {} failed: {err}", mutation.label(), mutation.task_id()))
            }
        };
        self.tasks.set_status(status);

        // An outstanding fetch may predate the mutation; fetch again once it lands.
        if self.tasks.is_fetching() {
            self.tasks_resync_pending = true;
        }
        self.refresh(Resource::Tasks).into_iter().collect()
    }
}

fn resolve_logged<T, K: PartialEq>(
    resource: Resource,
    store: &mut ResourceStore<T, K>,
    ticket: &FetchTicket<K>,
    result: Result<Vec<T>, String>,
) -> Resolution {
    let resolution = sync::resolve(store, ticket, result);
    match resolution {
        Resolution::Committed(count) => {
            info!(event = "sync_committed", resource = resource.as_str(), count);
        }
        Resolution::Failed => {
            let message = store
                .last_error()
                .map(|err| err.message.clone())
                .unwrap_or_default();
            warn!(
                event = "sync_failed",
                resource = resource.as_str(),
                error = %message
            );
        }
        Resolution::Stale => {}
    }
    resolution
}

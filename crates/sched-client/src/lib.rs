//! HTTP access to the scheduler backend.

use async_trait::async_trait;
use sched_core::{
    DashCommand, DashEvent, LastHeight, LastRunRecord, ListRunningRequest, Mutation,
    MutationOutcome, NewTaskRequest, Task,
};
use tracing::debug;

pub mod config;
mod error;
mod http;

pub use config::{ClientConfig, FileConfig, Overrides, Settings};
pub use error::{ClientError, ConfigError};
pub use http::HttpSchedulerClient;

/// Backend endpoints the dashboard depends on.
#[async_trait]
pub trait SchedulerApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError>;

    async fn enable_task(&self, schedule_id: &str) -> Result<MutationOutcome, ClientError>;

    async fn disable_task(&self, schedule_id: &str) -> Result<MutationOutcome, ClientError>;

    async fn delete_task(&self, task_id: &str) -> Result<MutationOutcome, ClientError>;

    async fn add_task(&self, request: &NewTaskRequest) -> Result<MutationOutcome, ClientError>;

    async fn list_running(
        &self,
        request: &ListRunningRequest,
    ) -> Result<Vec<LastRunRecord>, ClientError>;

    async fn last_heights(&self) -> Result<Vec<LastHeight>, ClientError>;

    async fn mutate(&self, mutation: &Mutation) -> Result<MutationOutcome, ClientError> {
        match mutation {
            Mutation::Enable { schedule_id, .. } => self.enable_task(schedule_id).await,
            Mutation::Disable { schedule_id, .. } => self.disable_task(schedule_id).await,
            Mutation::Delete { task_id } => self.delete_task(task_id).await,
            Mutation::Add(request) => self.add_task(request).await,
        }
    }
}

/// Runs one dashboard command against the backend and reports the result as
/// the matching event. Errors are flattened to their display form.
pub async fn execute<A>(api: &A, command: DashCommand) -> DashEvent
where
    A: SchedulerApi + ?Sized,
{
    match command {
        DashCommand::FetchTasks(ticket) => {
            debug!(event = "fetch_tasks", seq = ticket.seq);
            DashEvent::TasksLoaded {
                ticket,
                result: api.list_tasks().await.map_err(|err| err.to_string()),
            }
        }
        DashCommand::FetchLastRuns { ticket, query } => {
            debug!(
                event = "fetch_last_runs",
                seq = ticket.seq,
                task_id = %query.key.task_id,
                offset = query.page.offset
            );
            DashEvent::LastRunsLoaded {
                ticket,
                result: api
                    .list_running(&query.request())
                    .await
                    .map_err(|err| err.to_string()),
            }
        }
        DashCommand::FetchLastHeights(ticket) => {
            debug!(event = "fetch_last_heights", seq = ticket.seq);
            DashEvent::LastHeightsLoaded {
                ticket,
                result: api.last_heights().await.map_err(|err| err.to_string()),
            }
        }
        DashCommand::Mutate(mutation) => {
            let result = api.mutate(&mutation).await.map_err(|err| err.to_string());
            DashEvent::MutationSettled { mutation, result }
        }
    }
}

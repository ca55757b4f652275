use sched_client::SchedulerApi;
use sched_core::{DashCommand, DashEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Executes dashboard commands off the UI loop and posts results back.
#[derive(Clone)]
pub struct Runtime {
    api: Arc<dyn SchedulerApi>,
    events: mpsc::Sender<DashEvent>,
}

impl Runtime {
    pub fn new(api: Arc<dyn SchedulerApi>) -> (Self, mpsc::Receiver<DashEvent>) {
        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        (Self { api, events }, rx)
    }

    pub fn dispatch(&self, commands: Vec<DashCommand>) {
        for command in commands {
            let api = self.api.clone();
            let events = self.events.clone();
            tokio::spawn(async move {
                let event = sched_client::execute(api.as_ref(), command).await;
                if events.send(event).await.is_err() {
                    warn!(event = "event_channel_closed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sched_client::ClientError;
    use sched_core::{
        Dashboard, LastHeight, LastRunRecord, ListRunningRequest, MutationOutcome,
        NewTaskRequest, Task,
    };

    struct StaticApi;

    #[async_trait]
    impl SchedulerApi for StaticApi {
        async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
            Ok(vec![serde_json::from_value(serde_json::json!({ "task_id": "a" }))
                .expect("task")])
        }

        async fn enable_task(&self, _: &str) -> Result<MutationOutcome, ClientError> {
            Ok(MutationOutcome::Applied)
        }

        async fn disable_task(&self, _: &str) -> Result<MutationOutcome, ClientError> {
            Ok(MutationOutcome::Applied)
        }

        async fn delete_task(&self, _: &str) -> Result<MutationOutcome, ClientError> {
            Ok(MutationOutcome::Applied)
        }

        async fn add_task(&self, _: &NewTaskRequest) -> Result<MutationOutcome, ClientError> {
            Ok(MutationOutcome::Applied)
        }

        async fn list_running(
            &self,
            _: &ListRunningRequest,
        ) -> Result<Vec<LastRunRecord>, ClientError> {
            Ok(Vec::new())
        }

        async fn last_heights(&self) -> Result<Vec<LastHeight>, ClientError> {
            Ok(vec![LastHeight::default()])
        }
    }

    #[tokio::test]
    async fn dispatched_commands_report_back() {
        let (runtime, mut rx) = Runtime::new(Arc::new(StaticApi));
        let mut dash = Dashboard::default();
        runtime.dispatch(dash.start());

        for _ in 0..2 {
            let event = rx.recv().await.expect("event");
            assert!(dash.apply(event).is_empty());
        }
        assert_eq!(dash.tasks().items().len(), 1);
        assert_eq!(dash.last_heights().items().len(), 1);
    }
}

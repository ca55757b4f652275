use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::SchedulerApi;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use sched_core::{
    LastHeight, LastRunRecord, ListRunningRequest, MutationOutcome, MutationReply,
    NewTaskRequest, Task,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Which failures a request may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryOn {
    Unsent,
    TransientOrServer,
}

impl RetryOn {
    fn allows(self, err: &ClientError) -> bool {
        match self {
            RetryOn::Unsent => err.is_unsent(),
            RetryOn::TransientOrServer => err.is_transient() || err.is_server_error(),
        }
    }
}

#[derive(Debug)]
struct RawResponse {
    code: u16,
    body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

#[derive(Debug, Clone)]
pub struct HttpSchedulerClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpSchedulerClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                path: config.base_url.to_string(),
                source,
            })?;
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    fn endpoint(&self, segments: &[&str], trailing_slash: bool) -> Result<Url, ClientError> {
        let mut url = self.config.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidBaseUrl {
                    url: self.config.base_url.to_string(),
                    reason: "cannot append path".to_string(),
                })?;
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.config.basic_auth() {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        retry_on: RetryOn,
    ) -> Result<RawResponse, ClientError> {
        let path = url.path().to_string();
        let mut attempt: u32 = 0;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let mut builder = self.request(method.clone(), url.clone());
            if let Some(body) = &body {
                builder = builder.json(body);
            }
            let result = match self.attempt(builder, &path).await {
                Ok(raw) if !raw.is_success() && retry_on == RetryOn::TransientOrServer => {
                    Err(ClientError::Status {
                        path: path.clone(),
                        code: raw.code,
                        body: raw.body,
                    })
                }
                other => other,
            };
            match result {
                Err(err) if attempt < self.config.retries && retry_on.allows(&err) => {
                    attempt += 1;
                    warn!(
                        event = "request_retry",
                        path = %path,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
                other => return other,
            }
        }
    }

    async fn attempt(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<RawResponse, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|err| transport_error(path, err))?;
        let code = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| transport_error(path, err))?;
        debug!(event = "request_done", path = %path, code, bytes = body.len());
        Ok(RawResponse { code, body })
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Vec<T>, ClientError> {
        let path = url.path().to_string();
        let raw = self
            .send(method, url, body, RetryOn::TransientOrServer)
            .await?;
        if !raw.is_success() {
            return Err(ClientError::Status {
                path,
                code: raw.code,
                body: raw.body,
            });
        }
        decode_list(&path, &raw.body)
    }

    async fn mutate_at(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<MutationOutcome, ClientError> {
        let path = url.path().to_string();
        let raw = self.send(method, url, body, RetryOn::Unsent).await?;
        match decode_reply(&path, &raw.body) {
            Ok(outcome) if raw.is_success() => Ok(outcome),
            Ok(MutationOutcome::Rejected(message)) => Ok(MutationOutcome::Rejected(message)),
            Ok(MutationOutcome::Applied) | Err(_) if !raw.is_success() => {
                Err(ClientError::Status {
                    path,
                    code: raw.code,
                    body: raw.body,
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl SchedulerApi for HttpSchedulerClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "list"], false)?;
        self.fetch_list(Method::GET, url, None).await
    }

    async fn enable_task(&self, schedule_id: &str) -> Result<MutationOutcome, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "enable", schedule_id], false)?;
        self.mutate_at(Method::GET, url, None).await
    }

    async fn disable_task(&self, schedule_id: &str) -> Result<MutationOutcome, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "disable", schedule_id], false)?;
        self.mutate_at(Method::GET, url, None).await
    }

    async fn delete_task(&self, task_id: &str) -> Result<MutationOutcome, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "deleteTask", task_id], false)?;
        self.mutate_at(Method::GET, url, None).await
    }

    async fn add_task(&self, request: &NewTaskRequest) -> Result<MutationOutcome, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "addTask"], true)?;
        let body = serde_json::to_value(request).map_err(|err| ClientError::Decode {
            path: url.path().to_string(),
            reason: err.to_string(),
        })?;
        self.mutate_at(Method::POST, url, Some(body)).await
    }

    async fn list_running(
        &self,
        request: &ListRunningRequest,
    ) -> Result<Vec<LastRunRecord>, ClientError> {
        let url = self.endpoint(
            &["scheduler", "runner", request.kind.as_str(), "listRunning"],
            false,
        )?;
        let body = serde_json::to_value(request).map_err(|err| ClientError::Decode {
            path: url.path().to_string(),
            reason: err.to_string(),
        })?;
        self.fetch_list(Method::POST, url, Some(body)).await
    }

    async fn last_heights(&self) -> Result<Vec<LastHeight>, ClientError> {
        let url = self.endpoint(&["scheduler", "core", "getLastHeights"], false)?;
        self.fetch_list(Method::GET, url, None).await
    }
}

fn transport_error(path: &str, err: reqwest::Error) -> ClientError {
    if err.is_connect() {
        ClientError::Connect {
            path: path.to_string(),
            source: err,
        }
    } else if err.is_timeout() {
        ClientError::Timeout {
            path: path.to_string(),
        }
    } else {
        ClientError::Transport {
            path: path.to_string(),
            source: err,
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    let next = current + current;
    if next > MAX_BACKOFF {
        MAX_BACKOFF
    } else {
        next
    }
}

/// Parses a body, unwrapping JSON documents the backend double-encoded as a
/// string literal. Empty bodies read as `null`.
fn parse_body(path: &str, body: &str) -> Result<Value, ClientError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|err| ClientError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    if let Value::String(inner) = &value {
        if let Ok(nested) = serde_json::from_str::<Value>(inner.trim()) {
            if nested.is_object() || nested.is_array() {
                return Ok(nested);
            }
        }
    }
    Ok(value)
}

fn decode_list<T: DeserializeOwned>(path: &str, body: &str) -> Result<Vec<T>, ClientError> {
    let value = match parse_body(path, body)? {
        Value::Object(mut map) => {
            if let Some(Value::String(error)) = map.get("error") {
                if !error.trim().is_empty() {
                    return Err(ClientError::Decode {
                        path: path.to_string(),
                        reason: error.clone(),
                    });
                }
            }
            match map.remove("list") {
                Some(list) => list,
                None => {
                    warn!(event = "list_missing", path = %path);
                    Value::Null
                }
            }
        }
        other => other,
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value).map_err(|err| ClientError::Decode {
            path: path.to_string(),
            reason: err.to_string(),
        }),
        other => Err(ClientError::Decode {
            path: path.to_string(),
            reason: format!("expected a list, got {other}"),
        }),
    }
}

fn decode_reply(path: &str, body: &str) -> Result<MutationOutcome, ClientError> {
    match parse_body(path, body)? {
        Value::Null => Ok(MutationOutcome::Applied),
        value @ Value::Object(_) => serde_json::from_value::<MutationReply>(value)
            .map(MutationOutcome::from)
            .map_err(|err| ClientError::Decode {
                path: path.to_string(),
                reason: err.to_string(),
            }),
        other => Err(ClientError::Decode {
            path: path.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

use crate::domain::model::{Declaration, DeployReport};
use crate::domain::ports::DeployAgent;
use crate::utils::error::{As3Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};

const DECLARE_PATH: &str = "/mgmt/shared/appsvcs/declare";
const TASK_PATH: &str = "/mgmt/shared/appsvcs/task";
const IN_PROGRESS: &str = "in progress";

#[derive(Debug, Deserialize)]
struct TaskResponse {
    id: Option<String>,
    #[serde(default)]
    results: Vec<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    code: i64,
    message: Option<String>,
    tenant: Option<String>,
    response: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Top-level error body the device returns with 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    results: Vec<TaskResult>,
}

enum TaskState {
    Running,
    Finished(String),
}

/// Talks to the AS3 REST endpoint on a BIG-IP.
#[derive(Clone)]
pub struct As3Client {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl As3Client {
    pub fn new(base_url: &str, user: &str, password: &str) -> Result<Self> {
        Self::builder(base_url, user, password).build()
    }

    pub fn builder(base_url: &str, user: &str, password: &str) -> As3ClientBuilder {
        As3ClientBuilder {
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            validate_certs: true,
            request_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            task_timeout: Duration::from_secs(300),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.user, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder, tenant: &str) -> Result<DeployReport> {
        let response = self.authed(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("📡 AS3 responded with {}: {}", status, body);

        if !status.is_success() {
            return Err(As3Error::deploy(describe_http_failure(status, &body)));
        }

        let task: TaskResponse = serde_json::from_str(&body).map_err(|e| {
            As3Error::deploy(format!("unexpected response from device ({}): {}", e, body))
        })?;

        if status == StatusCode::ACCEPTED {
            let id = task.id.ok_or_else(|| {
                As3Error::deploy("device accepted the request but returned no task id")
            })?;
            tracing::info!("⏳ Declaration accepted as task {}, waiting for completion", id);
            let message = self.wait_for_task(&id).await?;
            return Ok(report(tenant, message, Some(id)));
        }

        match classify(&task.results)? {
            TaskState::Finished(message) => Ok(report(tenant, message, task.id)),
            // some versions answer 200 with an in-progress task when async was honoured
            TaskState::Running => {
                let id = task.id.ok_or_else(|| {
                    As3Error::deploy("task is still running but the device returned no task id")
                })?;
                let message = self.wait_for_task(&id).await?;
                Ok(report(tenant, message, Some(id)))
            }
        }
    }

    async fn wait_for_task(&self, id: &str) -> Result<String> {
        let url = format!("{}{}/{}", self.base_url, TASK_PATH, id);
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let response = self.authed(self.client.get(&url)).send().await?;
            let status = response.status();
            let body = response.text().await?;

            if !status.is_success() {
                return Err(As3Error::deploy(describe_http_failure(status, &body)));
            }

            let task: TaskResponse = serde_json::from_str(&body).map_err(|e| {
                As3Error::deploy(format!("unexpected task response ({}): {}", e, body))
            })?;

            match classify(&task.results)? {
                TaskState::Finished(message) => return Ok(message),
                TaskState::Running => {
                    if Instant::now() + self.poll_interval > deadline {
                        return Err(As3Error::deploy(format!(
                            "task {} did not finish within {:?}",
                            id, self.task_timeout
                        )));
                    }
                    tracing::debug!("⏳ Task {} still in progress", id);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl DeployAgent for As3Client {
    async fn submit(&self, declaration: &Declaration) -> Result<DeployReport> {
        let url = format!("{}{}", self.base_url, DECLARE_PATH);
        tracing::info!("📡 Submitting declaration for {} to {}", declaration.tenant, url);

        let request = self
            .client
            .post(&url)
            .query(&[("async", "true")])
            .json(&declaration.body);
        self.send(request, &declaration.tenant).await
    }

    async fn remove(&self, tenant: &str) -> Result<DeployReport> {
        let url = format!("{}{}/{}", self.base_url, DECLARE_PATH, tenant);
        tracing::info!("🗑️ Removing tenant {} via {}", tenant, url);

        self.send(self.client.delete(&url), tenant).await
    }
}

pub struct As3ClientBuilder {
    base_url: String,
    user: String,
    password: String,
    validate_certs: bool,
    request_timeout: Duration,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl As3ClientBuilder {
    pub fn validate_certs(mut self, validate: bool) -> Self {
        self.validate_certs = validate;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<As3Client> {
        if !self.validate_certs {
            tracing::warn!("⚠️ TLS certificate validation is disabled for {}", self.base_url);
        }
        let client = Client::builder()
            .danger_accept_invalid_certs(!self.validate_certs)
            .timeout(self.request_timeout)
            .build()?;

        Ok(As3Client {
            client,
            base_url: self.base_url,
            user: self.user,
            password: self.password,
            poll_interval: self.poll_interval,
            task_timeout: self.task_timeout,
        })
    }
}

fn report(tenant: &str, message: String, task_id: Option<String>) -> DeployReport {
    DeployReport {
        tenant: tenant.to_string(),
        message,
        task_id,
        completed_at: Utc::now(),
    }
}

fn classify(results: &[TaskResult]) -> Result<TaskState> {
    if results.is_empty()
        || results
            .iter()
            .any(|r| r.message.as_deref() == Some(IN_PROGRESS))
    {
        return Ok(TaskState::Running);
    }

    let failures: Vec<String> = results
        .iter()
        .filter(|r| !is_success(r))
        .map(describe_result)
        .collect();
    if !failures.is_empty() {
        return Err(As3Error::deploy(failures.join("; ")));
    }

    let messages: Vec<String> = results
        .iter()
        .map(|r| match (&r.tenant, &r.message) {
            (Some(tenant), Some(message)) if !tenant.is_empty() => format!("{}: {}", tenant, message),
            (_, Some(message)) => message.clone(),
            _ => format!("code {}", r.code),
        })
        .collect();
    Ok(TaskState::Finished(messages.join("; ")))
}

fn is_success(result: &TaskResult) -> bool {
    result.code == 200 || matches!(result.message.as_deref(), Some("success") | Some("no change"))
}

fn describe_result(result: &TaskResult) -> String {
    let mut text = match &result.tenant {
        Some(tenant) if !tenant.is_empty() => format!("{}: ", tenant),
        _ => String::new(),
    };
    text.push_str(result.message.as_deref().unwrap_or("failed"));
    text.push_str(&format!(" (code {})", result.code));
    if let Some(response) = &result.response {
        match response {
            serde_json::Value::String(s) => text.push_str(&format!(": {}", s)),
            other => text.push_str(&format!(": {}", other)),
        }
    }
    if !result.errors.is_empty() {
        text.push_str(&format!(" [{}]", result.errors.join(", ")));
    }
    text
}

fn describe_http_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.results.is_empty() => {
            let details: Vec<String> = parsed.results.iter().map(describe_result).collect();
            format!("HTTP {}: {}", status, details.join("; "))
        }
        Ok(parsed) if parsed.message.is_some() || !parsed.errors.is_empty() => {
            let mut text = format!("HTTP {}: {}", status, parsed.message.unwrap_or_default());
            if !parsed.errors.is_empty() {
                text.push_str(&format!(" [{}]", parsed.errors.join(", ")));
            }
            text
        }
        _ => format!("HTTP {}: {}", status, body),
    }
}

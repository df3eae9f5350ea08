//! Rendering Provider - Transport Seam
//!
//! `RenderProvider` is everything the job client needs from the outside world.
//! `BannerbearProvider` speaks the provider's HTTP API with a blocking agent.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::modifications::Modification;
use crate::templates::{ProviderTemplate, TemplateDescriptor, TemplateSummary};

pub const DEFAULT_BASE_URL: &str = "https://api.bannerbear.com/v2";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    /// Anything that is not a terminal status keeps the job pending
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(JobStatus::from_provider(&raw))
    }
}

/// Body of the job-creation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateJobRequest {
    pub template: String,
    pub modifications: Vec<Modification>,
}

/// What the provider reports about a job, on creation and on every status fetch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSnapshot {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub image_url_png: Option<String>,
}

pub trait RenderProvider {
    fn create_job(&self, request: &CreateJobRequest) -> Result<JobSnapshot, ProviderError>;
    fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ProviderError>;
    fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError>;
    fn template_details(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError>;
}

impl<P: RenderProvider + ?Sized> RenderProvider for &P {
    fn create_job(&self, request: &CreateJobRequest) -> Result<JobSnapshot, ProviderError> {
        (**self).create_job(request)
    }

    fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        (**self).fetch_job(job_id)
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        (**self).list_templates()
    }

    fn template_details(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        (**self).template_details(template_id)
    }
}

/// Build a blocking agent with a per-request timeout
pub(crate) fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Decode a JSON response, classifying failures the way every client here does
pub(crate) fn read_json<T: DeserializeOwned>(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<T, ProviderError> {
    match result {
        Ok(response) => response
            .into_json::<T>()
            .map_err(|e| ProviderError::Decode(e.to_string())),
        Err(ureq::Error::Status(code, response)) => Err(ProviderError::Status {
            code,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => {
            Err(ProviderError::Transport(transport.to_string()))
        }
    }
}

pub struct BannerbearProvider {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl BannerbearProvider {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_defaults(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent
            .get(&self.url(path))
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }
}

impl RenderProvider for BannerbearProvider {
    fn create_job(&self, request: &CreateJobRequest) -> Result<JobSnapshot, ProviderError> {
        tracing::debug!(
            template = %request.template,
            modifications = request.modifications.len(),
            "POST images"
        );
        let response = self
            .agent
            .post(&self.url("images"))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(request);
        read_json(response)
    }

    fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        tracing::trace!(job_id, "GET images/{{uid}}");
        read_json(self.get(&format!("images/{job_id}")).call())
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        let raw: Vec<ProviderTemplate> = read_json(self.get("templates").call())?;
        Ok(raw.into_iter().map(TemplateSummary::from).collect())
    }

    fn template_details(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        let raw: ProviderTemplate =
            read_json(self.get(&format!("templates/{template_id}")).call())?;
        Ok(TemplateDescriptor::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_status_is_pending() {
        let snap: JobSnapshot =
            serde_json::from_value(json!({"uid": "a", "status": "processing"})).unwrap();
        assert_eq!(snap.status, JobStatus::Pending);
    }

    #[test]
    fn test_terminal_statuses() {
        assert_eq!(JobStatus::from_provider("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::from_provider("failed"), JobStatus::Failed);
    }

    #[test]
    fn test_snapshot_tolerates_missing_fields() {
        let snap: JobSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(snap.uid.is_empty());
        assert_eq!(snap.image_url_png, None);
    }
}

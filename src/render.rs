//! Render Job Client - Submission and Polling
//!
//! State machine for a job: Pending -> Completed, Pending -> Failed, and
//! Pending -> Pending up to `max_attempts - 1` times. Nothing leaves a
//! terminal state. The client holds no per-job state of its own.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::submission_fingerprint;
use crate::modifications::{for_submission, Modification};
use crate::provider::{CreateJobRequest, JobStatus, ProviderError, RenderProvider};
use crate::templates::{TemplateDescriptor, TemplateSummary};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Render submission failed: {cause}")]
pub struct SubmissionError {
    pub cause: ProviderError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Render did not complete after {attempts_made} attempt(s)")]
    Timeout {
        attempts_made: u32,
        last_status: Option<JobStatus>,
        last_error: Option<ProviderError>,
    },

    #[error("Render job {job_id} failed on the provider")]
    Failed { job_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Poll(#[from] PollError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    pub template_id: String,
    pub status: JobStatus,
    pub result_locator: Option<String>,
    pub created_fields: Vec<Modification>,
    pub fingerprint: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedArtifact {
    pub job_id: String,
    pub image_url: String,
    pub completed_at: DateTime<Utc>,
}

pub struct RenderJobClient<P> {
    provider: P,
}

impl<P: RenderProvider> RenderJobClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        self.provider.list_templates()
    }

    pub fn template_details(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        self.provider.template_details(template_id)
    }

    /// Create a render job. Exactly one outbound call; never retried.
    ///
    /// An empty modification set is a valid no-op render.
    pub fn submit(
        &self,
        template_id: &str,
        modifications: &[Modification],
    ) -> Result<RenderJob, SubmissionError> {
        let request = CreateJobRequest {
            template: template_id.to_string(),
            modifications: for_submission(modifications),
        };
        let fingerprint = submission_fingerprint(template_id, &request.modifications);

        let snapshot = self
            .provider
            .create_job(&request)
            .map_err(|cause| SubmissionError { cause })?;

        if snapshot.uid.is_empty() {
            return Err(SubmissionError {
                cause: ProviderError::Decode("job creation response has no uid".into()),
            });
        }

        tracing::info!(
            job_id = %snapshot.uid,
            template = template_id,
            fields = request.modifications.len(),
            %fingerprint,
            "render job submitted"
        );

        Ok(RenderJob {
            id: snapshot.uid,
            template_id: request.template,
            status: JobStatus::Pending,
            result_locator: None,
            created_fields: request.modifications,
            fingerprint,
            submitted_at: Utc::now(),
        })
    }

    /// Poll a job until it completes, fails, or the attempt budget runs out.
    ///
    /// A transport error on any attempt ends polling immediately.
    pub fn poll_until_done(
        &self,
        job: &mut RenderJob,
        policy: PollPolicy,
    ) -> Result<CompletedArtifact, PollError> {
        self.poll_with_sleep(job, policy, thread::sleep)
    }

    pub(crate) fn poll_with_sleep(
        &self,
        job: &mut RenderJob,
        policy: PollPolicy,
        mut sleep: impl FnMut(Duration),
    ) -> Result<CompletedArtifact, PollError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            let snapshot = match self.provider.fetch_job(&job.id) {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::debug!(job_id = %job.id, attempt, %error, "status fetch failed");
                    return Err(PollError::Timeout {
                        attempts_made: attempt,
                        last_status,
                        last_error: Some(error),
                    });
                }
            };
            tracing::debug!(job_id = %job.id, attempt, status = ?snapshot.status, "polled");
            last_status = Some(snapshot.status);

            match snapshot.status {
                JobStatus::Completed => {
                    let Some(image_url) = snapshot.image_url_png else {
                        return Err(PollError::Timeout {
                            attempts_made: attempt,
                            last_status,
                            last_error: Some(ProviderError::Decode(
                                "completed job has no image_url_png".into(),
                            )),
                        });
                    };
                    job.status = JobStatus::Completed;
                    job.result_locator = Some(image_url.clone());
                    return Ok(CompletedArtifact {
                        job_id: job.id.clone(),
                        image_url,
                        completed_at: Utc::now(),
                    });
                }
                JobStatus::Failed => {
                    job.status = JobStatus::Failed;
                    return Err(PollError::Failed {
                        job_id: job.id.clone(),
                    });
                }
                JobStatus::Pending => {
                    if attempt < max_attempts {
                        sleep(policy.interval);
                    }
                }
            }
        }

        Err(PollError::Timeout {
            attempts_made: max_attempts,
            last_status,
            last_error: None,
        })
    }

    /// Submit and poll in one call
    pub fn render(
        &self,
        template_id: &str,
        modifications: &[Modification],
        policy: PollPolicy,
    ) -> Result<(RenderJob, CompletedArtifact), RenderError> {
        let mut job = self.submit(template_id, modifications)?;
        let artifact = self.poll_until_done(&mut job, policy)?;
        Ok((job, artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JobSnapshot;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays a fixed list of status-fetch outcomes
    struct Scripted {
        statuses: RefCell<VecDeque<Result<JobSnapshot, ProviderError>>>,
        fetches: Cell<u32>,
        creates: RefCell<Vec<CreateJobRequest>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<&str, ProviderError>>) -> Self {
            let statuses = outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| {
                    outcome.map(|status| JobSnapshot {
                        uid: "job_1".into(),
                        status: JobStatus::from_provider(status),
                        image_url_png: (status == "completed")
                            .then(|| format!("https://cdn.example/render-{}.png", i + 1)),
                    })
                })
                .collect();
            Self {
                statuses: RefCell::new(statuses),
                fetches: Cell::new(0),
                creates: RefCell::new(vec![]),
            }
        }
    }

    impl RenderProvider for Scripted {
        fn create_job(&self, request: &CreateJobRequest) -> Result<JobSnapshot, ProviderError> {
            self.creates.borrow_mut().push(request.clone());
            Ok(JobSnapshot {
                uid: "job_1".into(),
                status: JobStatus::Pending,
                image_url_png: None,
            })
        }

        fn fetch_job(&self, _job_id: &str) -> Result<JobSnapshot, ProviderError> {
            self.fetches.set(self.fetches.get() + 1);
            self.statuses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("fetched after script ended"))
        }

        fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
            Ok(vec![])
        }

        fn template_details(&self, id: &str) -> Result<TemplateDescriptor, ProviderError> {
            Err(ProviderError::Status {
                code: 404,
                body: id.to_string(),
            })
        }
    }

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy::new(max_attempts, Duration::ZERO)
    }

    fn submitted(client: &RenderJobClient<&Scripted>) -> RenderJob {
        client
            .submit("tpl", &[Modification::text("title", "Hi")])
            .unwrap()
    }

    #[test]
    fn test_completes_on_third_attempt() {
        let script = Scripted::new(vec![Ok("pending"), Ok("pending"), Ok("completed")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let artifact = client.poll_until_done(&mut job, fast(5)).unwrap();

        assert_eq!(script.fetches.get(), 3);
        assert_eq!(artifact.image_url, "https://cdn.example/render-3.png");
        assert_eq!(artifact.job_id, "job_1");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result_locator.as_deref(), Some(artifact.image_url.as_str()));
    }

    #[test]
    fn test_exhausted_attempts_time_out() {
        let script = Scripted::new(vec![Ok("pending"), Ok("processing"), Ok("pending")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let err = client.poll_until_done(&mut job, fast(3)).unwrap_err();

        assert_eq!(
            err,
            PollError::Timeout {
                attempts_made: 3,
                last_status: Some(JobStatus::Pending),
                last_error: None,
            }
        );
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_sleeps_only_between_attempts() {
        let script = Scripted::new(vec![Ok("pending"), Ok("pending"), Ok("pending")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);
        let mut sleeps = vec![];

        let policy = PollPolicy::new(3, Duration::from_millis(200));
        let err = client
            .poll_with_sleep(&mut job, policy, |d| sleeps.push(d))
            .unwrap_err();

        assert!(matches!(err, PollError::Timeout { attempts_made: 3, .. }));
        assert_eq!(sleeps, vec![Duration::from_millis(200); 2]);
    }

    #[test]
    fn test_no_sleep_after_terminal_status() {
        let script = Scripted::new(vec![Ok("pending"), Ok("completed")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);
        let mut sleeps = 0;

        let policy = PollPolicy::new(5, Duration::from_millis(200));
        client
            .poll_with_sleep(&mut job, policy, |_| sleeps += 1)
            .unwrap();

        assert_eq!(sleeps, 1);
    }

    #[test]
    fn test_poll_waits_the_interval() {
        let script = Scripted::new(vec![Ok("pending"), Ok("pending"), Ok("pending")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);
        let interval = Duration::from_millis(50);

        let started = std::time::Instant::now();
        let _ = client.poll_until_done(&mut job, PollPolicy::new(3, interval));

        assert!(started.elapsed() >= interval * 2);
    }

    #[test]
    fn test_failed_stops_immediately() {
        let script = Scripted::new(vec![Ok("pending"), Ok("failed"), Ok("completed")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let err = client.poll_until_done(&mut job, fast(5)).unwrap_err();

        assert_eq!(err, PollError::Failed { job_id: "job_1".into() });
        assert_eq!(script.fetches.get(), 2);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_transport_error_aborts_polling() {
        let script = Scripted::new(vec![
            Ok("pending"),
            Err(ProviderError::Transport("connection reset".into())),
            Ok("completed"),
        ]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let err = client.poll_until_done(&mut job, fast(5)).unwrap_err();

        match err {
            PollError::Timeout {
                attempts_made,
                last_status,
                last_error,
            } => {
                assert_eq!(attempts_made, 2);
                assert_eq!(last_status, Some(JobStatus::Pending));
                assert!(matches!(last_error, Some(ProviderError::Transport(_))));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(script.fetches.get(), 2);
    }

    #[test]
    fn test_zero_attempts_still_polls_once() {
        let script = Scripted::new(vec![Ok("completed")]);
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let policy = PollPolicy {
            max_attempts: 0,
            interval: Duration::ZERO,
        };
        assert!(client.poll_until_done(&mut job, policy).is_ok());
        assert_eq!(script.fetches.get(), 1);
    }

    #[test]
    fn test_completed_without_url_is_malformed() {
        let script = Scripted::new(vec![]);
        script.statuses.borrow_mut().push_back(Ok(JobSnapshot {
            uid: "job_1".into(),
            status: JobStatus::Completed,
            image_url_png: None,
        }));
        let client = RenderJobClient::new(&script);
        let mut job = submitted(&client);

        let err = client.poll_until_done(&mut job, fast(5)).unwrap_err();
        assert!(matches!(
            err,
            PollError::Timeout {
                attempts_made: 1,
                last_error: Some(ProviderError::Decode(_)),
                ..
            }
        ));
    }

    #[test]
    fn test_submit_drops_unset_and_records_fields() {
        let script = Scripted::new(vec![]);
        let client = RenderJobClient::new(&script);

        let job = client
            .submit(
                "tpl",
                &[Modification::unset("photo"), Modification::text("title", "Hi")],
            )
            .unwrap();

        let creates = script.creates.borrow();
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].modifications, vec![Modification::text("title", "Hi")]);
        assert_eq!(job.created_fields, creates[0].modifications);
        assert_eq!(
            job.fingerprint,
            submission_fingerprint("tpl", &[Modification::text("title", "Hi")])
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(script.fetches.get(), 0);
    }

    #[test]
    fn test_render_unifies_errors() {
        let script = Scripted::new(vec![Ok("failed")]);
        let client = RenderJobClient::new(&script);

        let err = client
            .render("tpl", &[Modification::text("title", "Hi")], fast(3))
            .unwrap_err();
        assert!(matches!(err, RenderError::Poll(PollError::Failed { .. })));
    }
}

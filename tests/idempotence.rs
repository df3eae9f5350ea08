//! No deduplication: identical submissions are independent jobs.

use std::cell::RefCell;

use bannerforge_core::{
    provider::{CreateJobRequest, JobSnapshot},
    submission_fingerprint, JobStatus, Modification, ProviderError, RenderJobClient,
    RenderProvider, TemplateDescriptor, TemplateSummary,
};

/// Assigns a fresh id to every created job, like the real provider
#[derive(Default)]
struct FreshIds {
    requests: RefCell<Vec<CreateJobRequest>>,
}

impl RenderProvider for FreshIds {
    fn create_job(&self, request: &CreateJobRequest) -> Result<JobSnapshot, ProviderError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(JobSnapshot {
            uid: uuid::Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            image_url_png: None,
        })
    }

    fn fetch_job(&self, job_id: &str) -> Result<JobSnapshot, ProviderError> {
        Err(ProviderError::Transport(format!("not polled in this test: {job_id}")))
    }

    fn list_templates(&self) -> Result<Vec<TemplateSummary>, ProviderError> {
        Ok(vec![])
    }

    fn template_details(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        Err(ProviderError::Status {
            code: 404,
            body: template_id.to_string(),
        })
    }
}

#[test]
fn identical_submissions_create_distinct_jobs() {
    let provider = FreshIds::default();
    let client = RenderJobClient::new(&provider);
    let mods = [Modification::text("headline", "Same")];

    let first = client.submit("tpl_1", &mods).unwrap();
    let second = client.submit("tpl_1", &mods).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(provider.requests.borrow().len(), 2);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.fingerprint, submission_fingerprint("tpl_1", &mods));
}

#[test]
fn empty_modification_set_is_a_valid_render() {
    let provider = FreshIds::default();
    let client = RenderJobClient::new(&provider);

    let job = client.submit("tpl_1", &[]).unwrap();

    assert!(job.created_fields.is_empty());
    assert!(provider.requests.borrow()[0].modifications.is_empty());
}

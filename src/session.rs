//! Design Session - Per-User Editing Context
//!
//! Everything a chat or form front-end accumulates between renders lives here
//! and is passed explicitly into the client. Sessions share nothing.

use thiserror::Error;

use crate::hashing::submission_fingerprint;
use crate::modifications::{self, Modification, UnknownFieldError, UpdateFieldCommand};
use crate::provider::RenderProvider;
use crate::render::{CompletedArtifact, PollPolicy, RenderError, RenderJob, RenderJobClient};
use crate::templates::TemplateDescriptor;
use crate::validation::{ValidationResult, Validator};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Choose a template before generating an image")]
    NoTemplate,

    #[error("No field has a value yet; fill out at least one field")]
    NothingToRender,

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Outcome of a successful `generate`
#[derive(Debug, Clone)]
pub struct Generated {
    pub job: RenderJob,
    pub artifact: CompletedArtifact,
    /// Same template and values as the previous submission from this session
    pub is_repeat_submission: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DesignSession {
    template: Option<TemplateDescriptor>,
    modifications: Vec<Modification>,
    last_fingerprint: Option<String>,
}

impl DesignSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch templates; any edits made against the previous one are discarded
    pub fn select_template(&mut self, template: TemplateDescriptor) {
        self.modifications = modifications::seed_from_template(&template);
        self.template = Some(template);
    }

    pub fn template(&self) -> Option<&TemplateDescriptor> {
        self.template.as_ref()
    }

    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }

    pub fn apply(&mut self, command: &UpdateFieldCommand) -> Result<(), UnknownFieldError> {
        self.modifications = modifications::apply(&self.modifications, command)?;
        Ok(())
    }

    pub fn set_text(&mut self, field: &str, value: &str) -> Result<(), UnknownFieldError> {
        self.apply(&UpdateFieldCommand::text(field, value))
    }

    pub fn set_image_url(&mut self, field: &str, url: &str) -> Result<(), UnknownFieldError> {
        self.apply(&UpdateFieldCommand::image_url(field, url))
    }

    /// Modifications that will actually be sent
    pub fn pending_modifications(&self) -> Vec<Modification> {
        modifications::for_submission(&self.modifications)
    }

    pub fn validate(&self) -> Result<ValidationResult, SessionError> {
        let template = self.template.as_ref().ok_or(SessionError::NoTemplate)?;
        Ok(Validator::new().validate(&self.modifications, template))
    }

    /// Submit the session's edits and wait for the artifact.
    ///
    /// Repeat submissions are flagged, never suppressed.
    pub fn generate<P: RenderProvider>(
        &mut self,
        client: &RenderJobClient<P>,
        policy: PollPolicy,
    ) -> Result<Generated, SessionError> {
        let template = self.template.as_ref().ok_or(SessionError::NoTemplate)?;
        let pending = self.pending_modifications();
        if pending.is_empty() {
            return Err(SessionError::NothingToRender);
        }

        let fingerprint = submission_fingerprint(&template.id, &pending);
        let is_repeat_submission = self.last_fingerprint.as_deref() == Some(fingerprint.as_str());
        self.last_fingerprint = Some(fingerprint);

        let (job, artifact) = client.render(&template.id, &pending, policy)?;
        Ok(Generated {
            job,
            artifact,
            is_repeat_submission,
        })
    }
}

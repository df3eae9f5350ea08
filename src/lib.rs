//! BannerForge Core - Template Render Job Client
//!
//! # Ground Rules
//! 1. The provider renders; we submit and poll
//! 2. Polling always ends: completed, failed, or out of attempts
//! 3. Errors are typed and never retried here
//! 4. Sessions own their state; the client owns none

pub mod assistant;
pub mod collaborators;
pub mod config;
pub mod hashing;
pub mod modifications;
pub mod provider;
pub mod render;
pub mod session;
pub mod telemetry;
pub mod templates;
pub mod validation;

pub use assistant::{AssistantError, AssistantReply};
pub use collaborators::{
    download_artifact, ChatTurn, DeepAiClient, FreeImageHost, GeminiClient, ImageHost,
    LanguageModel, TextToImage,
};
pub use config::{ConfigError, Settings};
pub use hashing::{canonical_json, submission_fingerprint};
pub use modifications::{
    apply, Modification, ModificationValue, UnknownFieldError, UpdateFieldCommand, ValueKind,
};
pub use provider::{BannerbearProvider, JobStatus, ProviderError, RenderProvider};
pub use render::{
    CompletedArtifact, PollError, PollPolicy, RenderError, RenderJob, RenderJobClient,
    SubmissionError,
};
pub use session::{DesignSession, SessionError};
pub use templates::{FieldDescriptor, FieldKind, TemplateDescriptor, TemplateSummary};
pub use validation::{ValidationResult, ValidationViolation, Validator, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

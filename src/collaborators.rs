//! External Collaborators - Image Host, Text-to-Image, Artifact Download
//!
//! Thin request/response clients. None of them retry.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::assistant::{update_function_declaration, AssistantError, AssistantReply};
use crate::provider::{http_agent, read_json, ProviderError};
use crate::render::CompletedArtifact;

pub const FREEIMAGE_UPLOAD_URL: &str = "https://freeimage.host/api/1/upload";
pub const DEEPAI_TEXT2IMG_URL: &str = "https://api.deepai.org/api/text2img";
pub const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

const ARTIFACT_MAX_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub trait ImageHost {
    /// Upload raw image bytes, returning a public URL
    fn upload(&self, bytes: &[u8]) -> Result<String, ProviderError>;

    fn upload_file(&self, path: &Path) -> Result<String, UploadError> {
        let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.upload(&bytes)?)
    }
}

pub trait TextToImage {
    fn generate(&self, request: &TextToImageRequest) -> Result<String, ProviderError>;
}

/// A chat model that can answer in text or ask for a field update
pub trait LanguageModel {
    fn respond(&self, conversation: &[ChatTurn]) -> Result<AssistantReply, AssistantError>;
}

pub struct FreeImageHost {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    image: Option<UploadedImage>,
}

#[derive(Debug, Deserialize)]
struct UploadedImage {
    url: Option<String>,
}

impl FreeImageHost {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: FREEIMAGE_UPLOAD_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl ImageHost for FreeImageHost {
    fn upload(&self, bytes: &[u8]) -> Result<String, ProviderError> {
        let source = base64::engine::general_purpose::STANDARD.encode(bytes);
        tracing::debug!(bytes = bytes.len(), "uploading image");

        let response: UploadResponse = read_json(self.agent.post(&self.endpoint).send_form(&[
            ("key", self.api_key.as_str()),
            ("source", source.as_str()),
            ("format", "json"),
        ]))?;

        response
            .image
            .and_then(|i| i.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Decode("upload response has no image.url".into()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextToImageRequest {
    pub text: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

pub struct DeepAiClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Text2ImgResponse {
    output_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeepAiErrorBody {
    err: String,
}

impl DeepAiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: DEEPAI_TEXT2IMG_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TextToImage for DeepAiClient {
    fn generate(&self, request: &TextToImageRequest) -> Result<String, ProviderError> {
        let mut form = vec![("text", request.text.as_str()), ("grid_size", "1")];
        if let Some(style) = &request.style {
            form.push(("style", style.as_str()));
        }
        if let Some(negative) = &request.negative_prompt {
            form.push(("negative_prompt", negative.as_str()));
        }

        let result = self
            .agent
            .post(&self.endpoint)
            .set("api-key", &self.api_key)
            .send_form(&form);

        let response: Text2ImgResponse = read_json(result).map_err(|error| match error {
            // surface the provider's own explanation when it gives one
            ProviderError::Status { code, body } => {
                match serde_json::from_str::<DeepAiErrorBody>(&body) {
                    Ok(parsed) => ProviderError::Status {
                        code,
                        body: parsed.err,
                    },
                    Err(_) => ProviderError::Status { code, body },
                }
            }
            other => other,
        })?;

        response
            .output_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Decode("text2img response has no output_url".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

pub struct GeminiClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            endpoint: GEMINI_GENERATE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// `generateContent` body with the field-update tool always advertised
    pub fn request_body(conversation: &[ChatTurn]) -> Value {
        let contents: Vec<Value> = conversation
            .iter()
            .map(|turn| json!({"role": turn.role, "parts": [{"text": turn.text}]}))
            .collect();
        json!({
            "contents": contents,
            "tools": [{"functionDeclarations": [update_function_declaration()]}]
        })
    }
}

impl LanguageModel for GeminiClient {
    fn respond(&self, conversation: &[ChatTurn]) -> Result<AssistantReply, AssistantError> {
        tracing::debug!(turns = conversation.len(), "generateContent");
        let result = self
            .agent
            .post(&self.endpoint)
            .set("x-goog-api-key", &self.api_key)
            .send_json(Self::request_body(conversation));

        let body: Value = read_json(result)?;
        AssistantReply::from_response(&body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Fetch the rendered image so it can be saved locally
pub fn download_artifact(
    artifact: &CompletedArtifact,
    timeout: Duration,
) -> Result<ArtifactDownload, ProviderError> {
    let response = match http_agent(timeout).get(&artifact.image_url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            return Err(ProviderError::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            })
        }
        Err(ureq::Error::Transport(t)) => return Err(ProviderError::Transport(t.to_string())),
    };

    Ok(ArtifactDownload {
        file_name: format!("generated_{}.png", artifact.job_id),
        bytes: read_capped(response.into_reader(), ARTIFACT_MAX_BYTES)?,
    })
}

/// Read the whole body, refusing one longer than `limit` rather than truncating it
pub(crate) fn read_capped(reader: impl Read, limit: u64) -> Result<Vec<u8>, ProviderError> {
    let mut bytes = vec![];
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if bytes.len() as u64 > limit {
        return Err(ProviderError::Decode(format!("artifact exceeds {limit} bytes")));
    }
    Ok(bytes)
}

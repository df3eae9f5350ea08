//! Assistant Replies - Language Model Output at the Boundary
//!
//! The model answers either with free text or with an `update_modifications`
//! function call. Both are decoded here into `AssistantReply`.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::modifications::UpdateFieldCommand;
use crate::provider::ProviderError;

pub const UPDATE_FUNCTION: &str = "update_modifications";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    Text(String),
    Update(UpdateFieldCommand),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssistantError {
    #[error("The model returned no candidates")]
    Empty,

    #[error("Unsupported function call: {0}")]
    UnsupportedFunction(String),

    #[error("Function call is missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("Malformed model response: {0}")]
    Decode(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

impl AssistantReply {
    /// Decode a `generateContent` response body.
    ///
    /// Only the first candidate is considered. A function call in its first
    /// part takes precedence over any text.
    pub fn from_response(body: &Value) -> Result<Self, AssistantError> {
        let response: GenerateContentResponse = serde_json::from_value(body.clone())
            .map_err(|e| AssistantError::Decode(e.to_string()))?;

        let candidate = response.candidates.into_iter().next().ok_or(AssistantError::Empty)?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        if let Some(call) = parts.first().and_then(|p| p.function_call.as_ref()) {
            return decode_function_call(&call.name, &call.args).map(AssistantReply::Update);
        }

        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            return Err(AssistantError::Empty);
        }
        Ok(AssistantReply::Text(text))
    }
}

/// Decode `update_modifications{layer_name, new_text?, new_image_url?}`.
///
/// `new_text` wins when both values are present.
pub fn decode_function_call(
    name: &str,
    args: &Map<String, Value>,
) -> Result<UpdateFieldCommand, AssistantError> {
    if name != UPDATE_FUNCTION {
        return Err(AssistantError::UnsupportedFunction(name.to_string()));
    }

    let layer_name =
        string_arg(args, "layer_name").ok_or(AssistantError::MissingArgument("layer_name"))?;

    if let Some(text) = string_arg(args, "new_text") {
        return Ok(UpdateFieldCommand::text(layer_name, text));
    }
    if let Some(url) = string_arg(args, "new_image_url") {
        return Ok(UpdateFieldCommand::image_url(layer_name, url));
    }
    Err(AssistantError::MissingArgument("new_text"))
}

fn string_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Tool declaration advertised to the model so it can emit field updates
pub fn update_function_declaration() -> Value {
    json!({
        "name": UPDATE_FUNCTION,
        "description": "Updates the text or image_url for a specific layer in the design.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "layer_name": {
                    "type": "STRING",
                    "description": "The exact name of the layer to update."
                },
                "new_text": {
                    "type": "STRING",
                    "description": "New text content. Text layers only."
                },
                "new_image_url": {
                    "type": "STRING",
                    "description": "New image URL. Image layers only."
                }
            },
            "required": ["layer_name"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifications::ValueKind;

    #[test]
    fn test_function_call_becomes_update() {
        let body = json!({
            "candidates": [{"content": {"role": "model", "parts": [{
                "functionCall": {
                    "name": "update_modifications",
                    "args": {"layer_name": "photo", "new_image_url": "https://img/a.png"}
                }
            }]}}]
        });

        let reply = AssistantReply::from_response(&body).unwrap();
        assert_eq!(
            reply,
            AssistantReply::Update(UpdateFieldCommand {
                field_name: "photo".into(),
                new_value: "https://img/a.png".into(),
                value_kind: ValueKind::ImageUrl,
            })
        );
    }

    #[test]
    fn test_text_parts_are_joined() {
        let body = json!({
            "candidates": [{"content": {"parts": [
                {"text": "Type "},
                {"text": "choose template."}
            ]}}]
        });
        assert_eq!(
            AssistantReply::from_response(&body).unwrap(),
            AssistantReply::Text("Type choose template.".into())
        );
    }

    #[test]
    fn test_no_candidates_is_empty() {
        assert_eq!(
            AssistantReply::from_response(&json!({"candidates": []})),
            Err(AssistantError::Empty)
        );
    }

    #[test]
    fn test_function_call_argument_rules() {
        let args = json!({"layer_name": "title", "new_text": "A", "new_image_url": "B"});
        let cmd = decode_function_call(UPDATE_FUNCTION, args.as_object().unwrap()).unwrap();
        assert_eq!(cmd.value_kind, ValueKind::Text);

        let args = json!({"new_text": "A"});
        assert_eq!(
            decode_function_call(UPDATE_FUNCTION, args.as_object().unwrap()),
            Err(AssistantError::MissingArgument("layer_name"))
        );

        assert!(matches!(
            decode_function_call("delete_everything", &Map::new()),
            Err(AssistantError::UnsupportedFunction(_))
        ));
    }
}

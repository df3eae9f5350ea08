//! Modification Sets - Field-Level Edits
//!
//! A modification carries at most one value kind. `apply` is the only way a
//! command mutates a set, and it never touches the caller's copy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::templates::{FieldKind, TemplateDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    ImageUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModificationValue {
    #[default]
    Unset,
    Text(String),
    ImageUrl(String),
}

impl ModificationValue {
    pub fn new(kind: ValueKind, value: impl Into<String>) -> Self {
        match kind {
            ValueKind::Text => ModificationValue::Text(value.into()),
            ValueKind::ImageUrl => ModificationValue::ImageUrl(value.into()),
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            ModificationValue::Unset => None,
            ModificationValue::Text(_) => Some(ValueKind::Text),
            ModificationValue::ImageUrl(_) => Some(ValueKind::ImageUrl),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, ModificationValue::Unset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireModification", try_from = "WireModification")]
pub struct Modification {
    pub field_name: String,
    pub value: ModificationValue,
}

impl Modification {
    pub fn text(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: ModificationValue::Text(value.into()),
        }
    }

    pub fn image_url(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: ModificationValue::ImageUrl(value.into()),
        }
    }

    pub fn unset(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: ModificationValue::Unset,
        }
    }
}

/// Provider wire form: `{name, text?, image_url?}` with null keys omitted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireModification {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

impl From<Modification> for WireModification {
    fn from(m: Modification) -> Self {
        let (text, image_url) = match m.value {
            ModificationValue::Unset => (None, None),
            ModificationValue::Text(t) => (Some(t), None),
            ModificationValue::ImageUrl(u) => (None, Some(u)),
        };
        Self {
            name: m.field_name,
            text,
            image_url,
        }
    }
}

impl TryFrom<WireModification> for Modification {
    type Error = String;

    fn try_from(w: WireModification) -> Result<Self, Self::Error> {
        if w.name.is_empty() {
            return Err("modification name must not be empty".to_string());
        }
        let value = match (w.text, w.image_url) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "modification '{}' sets both text and image_url",
                    w.name
                ))
            }
            (Some(t), None) => ModificationValue::Text(t),
            (None, Some(u)) => ModificationValue::ImageUrl(u),
            (None, None) => ModificationValue::Unset,
        };
        Ok(Self {
            field_name: w.name,
            value,
        })
    }
}

/// A structured "update this field" instruction, typically produced by the
/// language model's function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFieldCommand {
    pub field_name: String,
    pub new_value: String,
    pub value_kind: ValueKind,
}

impl UpdateFieldCommand {
    pub fn text(field_name: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            new_value: new_value.into(),
            value_kind: ValueKind::Text,
        }
    }

    pub fn image_url(field_name: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            new_value: new_value.into(),
            value_kind: ValueKind::ImageUrl,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown field '{field_name}' (available: {})", .available.join(", "))]
pub struct UnknownFieldError {
    pub field_name: String,
    pub available: Vec<String>,
}

/// Apply a command to a modification set, returning the updated set.
pub fn apply(
    modifications: &[Modification],
    command: &UpdateFieldCommand,
) -> Result<Vec<Modification>, UnknownFieldError> {
    let position = modifications
        .iter()
        .position(|m| m.field_name == command.field_name)
        .ok_or_else(|| UnknownFieldError {
            field_name: command.field_name.clone(),
            available: modifications.iter().map(|m| m.field_name.clone()).collect(),
        })?;

    let mut updated = modifications.to_vec();
    updated[position].value = ModificationValue::new(command.value_kind, command.new_value.clone());
    Ok(updated)
}

/// One unset modification per user-editable field, in template order
pub fn seed_from_template(template: &TemplateDescriptor) -> Vec<Modification> {
    template
        .user_editable()
        .map(|f| Modification::unset(f.name.clone()))
        .collect()
}

/// Drop modifications that carry no value
pub fn for_submission(modifications: &[Modification]) -> Vec<Modification> {
    modifications
        .iter()
        .filter(|m| m.value.is_set())
        .cloned()
        .collect()
}

/// The value kind a field of this template kind accepts
pub fn accepted_kind(kind: &FieldKind) -> Option<ValueKind> {
    match kind {
        FieldKind::Text => Some(ValueKind::Text),
        FieldKind::Image => Some(ValueKind::ImageUrl),
        FieldKind::Other(_) => None,
    }
}

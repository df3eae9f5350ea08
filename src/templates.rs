//! Template Descriptors - Provider Layouts Resolved at the Boundary
//!
//! The provider describes layers as loosely-shaped JSON objects. Each layer is
//! resolved into a tagged `FieldKind` here so nothing downstream inspects raw keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type TemplateId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Image,
    /// Shapes, rectangles and any layer type we do not know about yet
    Other(String),
}

impl FieldKind {
    /// Resolve a layer kind from its raw JSON object.
    ///
    /// An explicit `type` key wins. Without one, the value keys the provider
    /// lists for the layer decide: `image_url` before `text`.
    pub fn resolve(declared: Option<&str>, layer: &Map<String, Value>) -> Self {
        match declared {
            Some("text") => FieldKind::Text,
            Some("image") => FieldKind::Image,
            Some(other) => FieldKind::Other(other.to_string()),
            None if layer.contains_key("image_url") => FieldKind::Image,
            None if layer.contains_key("text") => FieldKind::Text,
            None => FieldKind::Other("unknown".to_string()),
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, FieldKind::Other(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub label: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let label = humanize_label(&name);
        Self { name, kind, label }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub id: TemplateId,
    pub display_name: String,
    pub preview_locator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub id: TemplateId,
    pub display_name: String,
    pub preview_locator: String,
    pub editable_fields: Vec<FieldDescriptor>,
}

impl TemplateDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.editable_fields.iter().find(|f| f.name == name)
    }

    /// Fields a user may actually change, in template order
    pub fn user_editable(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.editable_fields.iter().filter(|f| f.kind.is_editable())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.user_editable().map(|f| f.name.as_str()).collect()
    }
}

// --- Wire shapes ---

/// A template exactly as the rendering provider returns it
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTemplate {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub available_modifications: Vec<ProviderLayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderLayer {
    pub name: String,
    #[serde(rename = "type", default)]
    pub layer_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<ProviderLayer> for FieldDescriptor {
    fn from(layer: ProviderLayer) -> Self {
        let kind = FieldKind::resolve(layer.layer_type.as_deref(), &layer.extra);
        FieldDescriptor::new(layer.name, kind)
    }
}

impl From<ProviderTemplate> for TemplateDescriptor {
    fn from(raw: ProviderTemplate) -> Self {
        Self {
            id: raw.uid,
            display_name: raw.name,
            preview_locator: raw.preview_url.unwrap_or_default(),
            editable_fields: raw
                .available_modifications
                .into_iter()
                .map(FieldDescriptor::from)
                .collect(),
        }
    }
}

impl From<ProviderTemplate> for TemplateSummary {
    fn from(raw: ProviderTemplate) -> Self {
        Self {
            id: raw.uid,
            display_name: raw.name,
            preview_locator: raw.preview_url.unwrap_or_default(),
        }
    }
}

/// Title-case a layer name for display: `main_image` -> `Main Image`
pub fn humanize_label(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

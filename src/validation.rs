//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations against a template.
//! Errors block a submission; warnings only describe what will be dropped.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::modifications::{accepted_kind, Modification, ModificationValue};
use crate::templates::{FieldKind, TemplateDescriptor};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub field: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub template_id: String,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn rules_violated(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.rule.as_str()).collect()
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(
        &self,
        modifications: &[Modification],
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation>;
}

fn violation(
    rule: &dyn ValidationRule,
    severity: ViolationSeverity,
    field: Option<&str>,
    message: String,
    remediation: &str,
) -> ValidationViolation {
    ValidationViolation {
        rule: rule.name().to_string(),
        severity,
        message,
        field: field.map(str::to_string),
        remediation: vec![remediation.to_string()],
    }
}

// --- Concrete Rules ---

pub struct UnknownFieldRule;

impl ValidationRule for UnknownFieldRule {
    fn name(&self) -> &'static str {
        "unknown_field"
    }

    fn validate(
        &self,
        mods: &[Modification],
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        mods.iter()
            .filter(|m| template.field(&m.field_name).is_none())
            .map(|m| {
                violation(
                    self,
                    ViolationSeverity::Error,
                    Some(&m.field_name),
                    format!("Template '{}' has no field '{}'", template.id, m.field_name),
                    &format!("Use one of: {}", template.field_names().join(", ")),
                )
            })
            .collect()
    }
}

pub struct ReadOnlyFieldRule;

impl ValidationRule for ReadOnlyFieldRule {
    fn name(&self) -> &'static str {
        "read_only_field"
    }

    fn validate(
        &self,
        mods: &[Modification],
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        mods.iter()
            .filter(|m| m.value.is_set())
            .filter_map(|m| match template.field(&m.field_name).map(|f| &f.kind) {
                Some(FieldKind::Other(kind)) => Some(violation(
                    self,
                    ViolationSeverity::Error,
                    Some(&m.field_name),
                    format!("Field '{}' is a '{}' layer and cannot be edited", m.field_name, kind),
                    "Only text and image fields accept values",
                )),
                _ => None,
            })
            .collect()
    }
}

pub struct KindMismatchRule;

impl ValidationRule for KindMismatchRule {
    fn name(&self) -> &'static str {
        "kind_mismatch"
    }

    fn validate(
        &self,
        mods: &[Modification],
        template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        for m in mods {
            let (Some(field), Some(given)) = (template.field(&m.field_name), m.value.kind()) else {
                continue;
            };
            match accepted_kind(&field.kind) {
                Some(expected) if expected != given => violations.push(violation(
                    self,
                    ViolationSeverity::Error,
                    Some(&m.field_name),
                    format!("Field '{}' expects {:?}, got {:?}", m.field_name, expected, given),
                    "Send text to text fields and image URLs to image fields",
                )),
                _ => {}
            }
        }
        violations
    }
}

pub struct DuplicateFieldRule;

impl ValidationRule for DuplicateFieldRule {
    fn name(&self) -> &'static str {
        "duplicate_field"
    }

    fn validate(
        &self,
        mods: &[Modification],
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        let mut seen = HashSet::new();
        let mut violations = vec![];
        for m in mods.iter().filter(|m| m.value.is_set()) {
            if !seen.insert(m.field_name.as_str()) {
                violations.push(violation(
                    self,
                    ViolationSeverity::Error,
                    Some(&m.field_name),
                    format!("Field '{}' is set more than once", m.field_name),
                    "Keep a single value per field",
                ));
            }
        }
        violations
    }
}

pub struct EmptyValueRule;

impl ValidationRule for EmptyValueRule {
    fn name(&self) -> &'static str {
        "empty_value"
    }

    fn validate(
        &self,
        mods: &[Modification],
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        mods.iter()
            .filter(|m| match &m.value {
                ModificationValue::Unset => true,
                ModificationValue::Text(v) | ModificationValue::ImageUrl(v) => v.trim().is_empty(),
            })
            .map(|m| {
                violation(
                    self,
                    ViolationSeverity::Warning,
                    Some(&m.field_name),
                    format!("Field '{}' has no value", m.field_name),
                    "Unset fields keep the template's default content",
                )
            })
            .collect()
    }
}

pub struct NothingToRenderRule;

impl ValidationRule for NothingToRenderRule {
    fn name(&self) -> &'static str {
        "nothing_to_render"
    }

    fn validate(
        &self,
        mods: &[Modification],
        _template: &TemplateDescriptor,
    ) -> Vec<ValidationViolation> {
        if mods.iter().any(|m| m.value.is_set()) {
            return vec![];
        }
        vec![violation(
            self,
            ViolationSeverity::Warning,
            None,
            "No field has a value; the render would match the template preview".to_string(),
            "Fill out at least one field",
        )]
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(UnknownFieldRule),
                Box::new(ReadOnlyFieldRule),
                Box::new(KindMismatchRule),
                Box::new(DuplicateFieldRule),
                Box::new(EmptyValueRule),
                Box::new(NothingToRenderRule),
            ],
        }
    }

    pub fn validate(
        &self,
        modifications: &[Modification],
        template: &TemplateDescriptor,
    ) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(modifications, template))
            .collect();

        // Warnings never block
        let valid = !violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult {
            valid,
            violations,
            template_id: template.id.clone(),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

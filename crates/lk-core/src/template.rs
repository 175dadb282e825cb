//! Saved permission presets a responder can apply to an incoming request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consent::{DurationClass, PermissionDraft, PermissionSet};
use crate::ids::TemplateId;

const UNTITLED: &str = "New Template";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(TemplateId),
}

/// Fields supplied when saving a new template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub duration_class: DurationClass,
    pub auto_approve: bool,
    pub tags: Vec<String>,
}

impl Default for TemplateInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            permissions: PermissionSet::new(true, true, false),
            duration_class: DurationClass::SevenDays,
            auto_approve: false,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub permissions: PermissionSet,
    pub duration_class: DurationClass,
    /// Confirm the approval straight away when the preset is applied.
    pub auto_approve: bool,
    pub tags: Vec<String>,
    pub usage_count: u32,
}

impl ConnectionTemplate {
    /// Builds a fresh template. A blank name falls back to "New Template".
    pub fn new(input: TemplateInput) -> Self {
        let name = input.name.trim();
        Self {
            id: TemplateId::new(),
            name: if name.is_empty() {
                UNTITLED.to_string()
            } else {
                name.to_string()
            },
            description: input.description,
            permissions: input.permissions,
            duration_class: input.duration_class,
            auto_approve: input.auto_approve,
            tags: input.tags,
            usage_count: 0,
        }
    }

    /// Copy under a new id, named "<name> (Copy)", with its usage reset.
    pub fn duplicate(&self) -> Self {
        Self {
            id: TemplateId::new(),
            name: format!("{} (Copy)", self.name),
            usage_count: 0,
            ..self.clone()
        }
    }

    pub fn draft(&self) -> PermissionDraft {
        PermissionDraft {
            permissions: self.permissions,
            duration_class: self.duration_class,
        }
    }

    /// Whether applying the preset leaves a draft that can be confirmed.
    pub fn allows_contact(&self) -> bool {
        self.permissions.allows_contact()
    }
}

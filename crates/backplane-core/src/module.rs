use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Maximum length of a module name.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum length of a module description.
pub const MAX_DESCRIPTION_LEN: usize = 500;
/// Maximum length of an access level tag.
pub const MAX_ACCESS_LEVEL_LEN: usize = 50;

/// A named, toggleable system capability.
///
/// Name uniqueness (case-insensitive) is enforced by the module store.
/// `created_at` is immutable after creation; `last_modified_at` and
/// `version` are maintained by the store on every successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified_at: OffsetDateTime,
    pub version: i64,
}

impl Module {
    /// Builds a new module from a draft with a fresh identifier,
    /// both timestamps set to now and version 0.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its constraints.
    pub fn from_draft(draft: ModuleDraft) -> Result<Self> {
        draft.validate()?;
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            name: draft.name,
            description: draft.description,
            active: draft.active,
            system: draft.system,
            access_level: draft.access_level,
            created_at: now,
            last_modified_at: now,
            version: 0,
        })
    }

    /// Validates field constraints on an already-built module.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its constraints.
    pub fn validate(&self) -> Result<()> {
        validate_fields(
            &self.name,
            self.description.as_deref(),
            self.access_level.as_deref(),
        )
    }
}

/// Creation input for a module. Identifier, timestamps and version are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
}

fn default_active() -> bool {
    true
}

impl ModuleDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            active: true,
            system: false,
            access_level: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_access_level(mut self, access_level: impl Into<String>) -> Self {
        self.access_level = Some(access_level.into());
        self
    }

    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn with_system(mut self, system: bool) -> Self {
        self.system = system;
        self
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its constraints.
    pub fn validate(&self) -> Result<()> {
        validate_fields(
            &self.name,
            self.description.as_deref(),
            self.access_level.as_deref(),
        )
    }
}

/// Partial update for a module: only present fields are merged.
///
/// A present `version` participates in the optimistic-concurrency check
/// performed by the store; it is never merged as data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl ModulePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.active.is_none()
            && self.system.is_none()
            && self.access_level.is_none()
    }

    /// Merges the present data fields into `module`. Timestamps and
    /// version are left for the store to maintain.
    pub fn apply(&self, module: &mut Module) {
        if let Some(name) = &self.name {
            module.name = name.clone();
        }
        if let Some(description) = &self.description {
            module.description = Some(description.clone());
        }
        if let Some(active) = self.active {
            module.active = active;
        }
        if let Some(system) = self.system {
            module.system = system;
        }
        if let Some(access_level) = &self.access_level {
            module.access_level = Some(access_level.clone());
        }
    }
}

fn validate_fields(
    name: &str,
    description: Option<&str>,
    access_level: Option<&str>,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::validation("module name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CoreError::validation(format!(
            "module name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if let Some(description) = description
        && description.len() > MAX_DESCRIPTION_LEN
    {
        return Err(CoreError::validation(format!(
            "module description must not exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if let Some(access_level) = access_level
        && access_level.len() > MAX_ACCESS_LEVEL_LEN
    {
        return Err(CoreError::validation(format!(
            "access level must not exceed {MAX_ACCESS_LEVEL_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft_assigns_identity_and_timestamps() {
        let draft = ModuleDraft::new("Billing")
            .with_description("Invoice management")
            .with_access_level("ADMIN");
        let module = Module::from_draft(draft).unwrap();

        assert_eq!(module.name, "Billing");
        assert_eq!(module.description.as_deref(), Some("Invoice management"));
        assert_eq!(module.access_level.as_deref(), Some("ADMIN"));
        assert!(module.active);
        assert!(!module.system);
        assert_eq!(module.version, 0);
        assert_eq!(module.created_at, module.last_modified_at);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Module::from_draft(ModuleDraft::new("  ")).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let err = Module::from_draft(ModuleDraft::new("x".repeat(MAX_NAME_LEN + 1))).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_overlong_description_rejected() {
        let draft = ModuleDraft::new("Billing").with_description("d".repeat(501));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_overlong_access_level_rejected() {
        let draft = ModuleDraft::new("Billing").with_access_level("a".repeat(51));
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_name_at_limit_accepted() {
        let draft = ModuleDraft::new("x".repeat(MAX_NAME_LEN));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut module = Module::from_draft(ModuleDraft::new("Billing")).unwrap();
        let patch = ModulePatch {
            active: Some(false),
            ..ModulePatch::default()
        };
        patch.apply(&mut module);

        assert_eq!(module.name, "Billing");
        assert!(!module.active);
        assert_eq!(module.version, 0);
    }

    #[test]
    fn test_patch_replaces_name_and_description() {
        let mut module = Module::from_draft(
            ModuleDraft::new("Billing").with_description("old"),
        )
        .unwrap();
        let patch = ModulePatch {
            name: Some("Invoicing".into()),
            description: Some("new".into()),
            ..ModulePatch::default()
        };
        patch.apply(&mut module);

        assert_eq!(module.name, "Invoicing");
        assert_eq!(module.description.as_deref(), Some("new"));
    }

    #[test]
    fn test_patch_is_empty_ignores_version() {
        let patch = ModulePatch {
            version: Some(3),
            ..ModulePatch::default()
        };
        assert!(patch.is_empty());
        assert!(ModulePatch::default().is_empty());
    }

    #[test]
    fn test_draft_deserializes_with_defaults() {
        let draft: ModuleDraft = serde_json::from_str(r#"{"name":"Billing"}"#).unwrap();
        assert!(draft.active);
        assert!(!draft.system);
        assert!(draft.description.is_none());
    }

    #[test]
    fn test_module_serializes_rfc3339_timestamps() {
        let module = Module::from_draft(ModuleDraft::new("Billing")).unwrap();
        let json = serde_json::to_value(&module).unwrap();
        let created = json["created_at"].as_str().unwrap();
        assert!(created.contains('T'));
        assert!(json.get("description").is_none());
    }
}

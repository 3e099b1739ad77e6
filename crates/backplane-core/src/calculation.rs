use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Maximum length of a calculation record label.
pub const MAX_LABEL_LEN: usize = 100;

/// Arithmetic operation tag carried by a calculation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    /// Infix symbol, used for human-readable record labels.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Parses an operation tag, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnsupportedOperation` for an unknown tag.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "subtract" => Ok(Self::Subtract),
            "multiply" => Ok(Self::Multiply),
            "divide" => Ok(Self::Divide),
            _ => Err(CoreError::unsupported_operation(tag)),
        }
    }

    /// Applies the operation to a pair of operands.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DivisionByZero` when dividing by exactly zero.
    pub fn apply(&self, operand1: f64, operand2: f64) -> Result<f64> {
        match self {
            Self::Add => Ok(operand1 + operand2),
            Self::Subtract => Ok(operand1 - operand2),
            Self::Multiply => Ok(operand1 * operand2),
            Self::Divide => {
                if operand2 == 0.0 {
                    Err(CoreError::DivisionByZero)
                } else {
                    Ok(operand1 / operand2)
                }
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One performed arithmetic operation plus optional free-standing
/// calculator state (memory value, scientific mode, last use).
///
/// The result is always derived from the operands and the operation tag;
/// a divide-by-zero record cannot be constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub scientific: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_value: Option<f64>,
    pub operand1: f64,
    pub operand2: f64,
    pub operation: Operation,
    pub result: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub version: i64,
}

impl CalculationRecord {
    /// Builds a record from a draft, computing the result from the
    /// operands and assigning identity, creation timestamp and version 0.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty or overlong label and
    /// `CoreError::DivisionByZero` for a divide draft with a zero divisor.
    pub fn from_draft(draft: CalculationDraft) -> Result<Self> {
        draft.validate()?;
        let result = draft.operation.apply(draft.operand1, draft.operand2)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: draft.name,
            active: draft.active,
            scientific: draft.scientific,
            last_used_at: draft.last_used_at,
            memory_value: draft.memory_value,
            operand1: draft.operand1,
            operand2: draft.operand2,
            operation: draft.operation,
            result,
            created_at: OffsetDateTime::now_utc(),
            version: 0,
        })
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its constraints.
    pub fn validate(&self) -> Result<()> {
        validate_label(&self.name)
    }
}

/// Creation input for a calculation record. The result is not part of
/// the draft; it is recomputed on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationDraft {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub scientific: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_value: Option<f64>,
    pub operand1: f64,
    pub operand2: f64,
    pub operation: Operation,
}

fn default_active() -> bool {
    true
}

impl CalculationDraft {
    pub fn new(operand1: f64, operand2: f64, operation: Operation) -> Self {
        Self {
            name: format!("{operand1} {} {operand2}", operation.symbol()),
            active: true,
            scientific: false,
            last_used_at: None,
            memory_value: None,
            operand1,
            operand2,
            operation,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_scientific(mut self, scientific: bool) -> Self {
        self.scientific = scientific;
        self
    }

    #[must_use]
    pub fn with_memory_value(mut self, memory_value: f64) -> Self {
        self.memory_value = Some(memory_value);
        self
    }

    #[must_use]
    pub fn with_last_used_at(mut self, last_used_at: OffsetDateTime) -> Self {
        self.last_used_at = Some(last_used_at);
        self
    }

    /// # Errors
    ///
    /// Returns `CoreError::Validation` when a field violates its constraints.
    pub fn validate(&self) -> Result<()> {
        validate_label(&self.name)
    }
}

/// Partial update for a calculation record's free-standing state.
/// Operands, operation and result are fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scientific: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl CalculationPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.active.is_none()
            && self.scientific.is_none()
            && self.last_used_at.is_none()
            && self.memory_value.is_none()
    }

    /// Merges the present data fields into `record`. Version is left for
    /// the store to maintain.
    pub fn apply(&self, record: &mut CalculationRecord) {
        if let Some(name) = &self.name {
            record.name = name.clone();
        }
        if let Some(active) = self.active {
            record.active = active;
        }
        if let Some(scientific) = self.scientific {
            record.scientific = scientific;
        }
        if let Some(last_used_at) = self.last_used_at {
            record.last_used_at = Some(last_used_at);
        }
        if let Some(memory_value) = self.memory_value {
            record.memory_value = Some(memory_value);
        }
    }
}

fn validate_label(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::validation("calculation name must not be empty"));
    }
    if name.len() > MAX_LABEL_LEN {
        return Err(CoreError::validation(format!(
            "calculation name must not exceed {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_case_insensitive() {
        assert_eq!(Operation::parse("add").unwrap(), Operation::Add);
        assert_eq!(Operation::parse("DIVIDE").unwrap(), Operation::Divide);
        assert_eq!(Operation::parse("Multiply").unwrap(), Operation::Multiply);
        assert_eq!("subtract".parse::<Operation>().unwrap(), Operation::Subtract);
    }

    #[test]
    fn test_operation_parse_unknown_tag() {
        let err = Operation::parse("modulo").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedOperation(tag) if tag == "modulo"));
    }

    #[test]
    fn test_operation_apply() {
        assert_eq!(Operation::Add.apply(2.0, 3.0).unwrap(), 5.0);
        assert_eq!(Operation::Subtract.apply(2.0, 3.0).unwrap(), -1.0);
        assert_eq!(Operation::Multiply.apply(2.0, 3.0).unwrap(), 6.0);
        assert_eq!(Operation::Divide.apply(9.0, 3.0).unwrap(), 3.0);
    }

    #[test]
    fn test_divide_by_zero_rejected() {
        for operand1 in [0.0, 1.0, -7.5, f64::MAX] {
            let err = Operation::Divide.apply(operand1, 0.0).unwrap_err();
            assert!(matches!(err, CoreError::DivisionByZero));
        }
    }

    #[test]
    fn test_operation_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Operation::Add).unwrap(), "\"add\"");
        let op: Operation = serde_json::from_str("\"divide\"").unwrap();
        assert_eq!(op, Operation::Divide);
    }

    #[test]
    fn test_from_draft_computes_result() {
        let record =
            CalculationRecord::from_draft(CalculationDraft::new(10.0, 4.0, Operation::Subtract))
                .unwrap();
        assert_eq!(record.result, 6.0);
        assert_eq!(record.name, "10 - 4");
        assert_eq!(record.version, 0);
    }

    #[test]
    fn test_default_label_uses_symbol() {
        let draft = CalculationDraft::new(10.0, 5.0, Operation::Divide);
        assert_eq!(draft.name, "10 / 5");
    }

    #[test]
    fn test_divide_by_zero_draft_never_persists() {
        let err = CalculationRecord::from_draft(CalculationDraft::new(10.0, 0.0, Operation::Divide))
            .unwrap_err();
        assert!(matches!(err, CoreError::DivisionByZero));
    }

    #[test]
    fn test_empty_label_rejected() {
        let draft = CalculationDraft::new(1.0, 2.0, Operation::Add).with_name(" ");
        let err = CalculationRecord::from_draft(draft).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_patch_merges_state_fields() {
        let mut record =
            CalculationRecord::from_draft(CalculationDraft::new(1.0, 2.0, Operation::Add)).unwrap();
        let patch = CalculationPatch {
            scientific: Some(true),
            memory_value: Some(42.0),
            ..CalculationPatch::default()
        };
        patch.apply(&mut record);

        assert!(record.scientific);
        assert_eq!(record.memory_value, Some(42.0));
        assert_eq!(record.result, 3.0);
    }

    #[test]
    fn test_record_serializes_operation_tag() {
        let record =
            CalculationRecord::from_draft(CalculationDraft::new(6.0, 7.0, Operation::Multiply))
                .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["operation"], "multiply");
        assert_eq!(json["result"], 42.0);
    }
}

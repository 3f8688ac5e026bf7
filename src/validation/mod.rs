//! Error-collecting validation results
//!
//! Every ingestion and calculation step reports problems through a
//! [`ValidationResult`] instead of failing fast. Callers inspect the collected
//! messages and decide whether an import can proceed or a version can be
//! promoted.
//!
//! # Severities
//!
//! - `ERROR` blocks import and promotion
//! - `WARNING` allows import but the data should be reviewed
//! - `INFO` is purely informational
//!
//! # Usage
//!
//! ```rust
//! use radshift::validation::{codes, ValidationResult};
//!
//! let mut result = ValidationResult::new();
//! result.add_warning(codes::MISSING_MIDC, "No MidC assignment on weekday 2025-01-15");
//! assert!(result.can_import());
//! assert!(!result.can_promote());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known message codes
pub mod codes {
    pub const UNKNOWN_SHIFT_TYPE: &str = "UNKNOWN_SHIFT_TYPE";
    pub const INVALID_SHIFT_ROW: &str = "INVALID_SHIFT_ROW";
    pub const INVALID_ASSIGNMENT_ROW: &str = "INVALID_ASSIGNMENT_ROW";
    pub const UNKNOWN_PEOPLE: &str = "UNKNOWN_PEOPLE";
    pub const INACTIVE_PERSON: &str = "INACTIVE_PERSON";
    pub const NO_MATCHING_SHIFT: &str = "NO_MATCHING_SHIFT";
    pub const AMBIGUOUS_SHIFT: &str = "AMBIGUOUS_SHIFT";
    pub const DUPLICATE_ASSIGNMENT: &str = "DUPLICATE_ASSIGNMENT";
    pub const SPECIALTY_MISMATCH: &str = "SPECIALTY_MISMATCH";
    pub const MISSING_MIDC: &str = "MISSING_MIDC";
    pub const EMPTY_IMPORT: &str = "EMPTY_IMPORT";
    pub const TOO_MANY_ROWS: &str = "TOO_MANY_ROWS";
    pub const DUPLICATE_BATCH: &str = "DUPLICATE_BATCH";
    pub const IMPORT_SUMMARY: &str = "IMPORT_SUMMARY";
    pub const INVALID_DATE_RANGE: &str = "INVALID_DATE_RANGE";
    pub const COVERAGE_GAP: &str = "COVERAGE_GAP";
    pub const COVERAGE_IMPROVED: &str = "COVERAGE_IMPROVED";
    pub const COVERAGE_DEGRADED: &str = "COVERAGE_DEGRADED";
    pub const COVERAGE_UNCHANGED: &str = "COVERAGE_UNCHANGED";
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub code: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl Message {
    /// Look up a context field
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }
}

/// Ordered collection of validation messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default)]
    messages: Vec<Message>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Append a message with the given severity
    pub fn add(
        &mut self,
        severity: Severity,
        code: impl Into<String>,
        text: impl Into<String>,
        context: Option<Map<String, Value>>,
    ) -> &mut Self {
        self.messages.push(Message {
            severity,
            code: code.into(),
            text: text.into(),
            context,
        });
        self
    }

    pub fn add_error(&mut self, code: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.add(Severity::Error, code, text, None)
    }

    pub fn add_error_with_context(
        &mut self,
        code: impl Into<String>,
        text: impl Into<String>,
        context: Map<String, Value>,
    ) -> &mut Self {
        self.add(Severity::Error, code, text, Some(context))
    }

    pub fn add_warning(&mut self, code: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.add(Severity::Warning, code, text, None)
    }

    pub fn add_warning_with_context(
        &mut self,
        code: impl Into<String>,
        text: impl Into<String>,
        context: Map<String, Value>,
    ) -> &mut Self {
        self.add(Severity::Warning, code, text, Some(context))
    }

    pub fn add_info(&mut self, code: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.add(Severity::Info, code, text, None)
    }

    pub fn add_info_with_context(
        &mut self,
        code: impl Into<String>,
        text: impl Into<String>,
        context: Map<String, Value>,
    ) -> &mut Self {
        self.add(Severity::Info, code, text, Some(context))
    }

    /// Append every message of `other`, preserving order
    pub fn merge(&mut self, other: ValidationResult) -> &mut Self {
        self.messages.extend(other.messages);
        self
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn count_of(&self, severity: Severity) -> usize {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.count_of(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count_of(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count_of(Severity::Info)
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.severity == Severity::Warning)
    }

    /// No ERROR messages
    pub fn can_import(&self) -> bool {
        !self.has_errors()
    }

    /// No ERROR or WARNING messages
    pub fn can_promote(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }

    pub fn messages_by_code(&self, code: &str) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.code == code).collect()
    }

    pub fn messages_by_severity(&self, severity: Severity) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == severity)
            .collect()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Human-readable counts followed by every error and warning
    pub fn summary(&self) -> String {
        if self.messages.is_empty() {
            return "Validation passed: no errors".to_string();
        }

        let errors = self.error_count();
        let warnings = self.warning_count();
        let mut summary = format!(
            "Validation result: {errors} errors, {warnings} warnings, {} info messages",
            self.info_count()
        );

        for (severity, heading) in [(Severity::Error, "Errors"), (Severity::Warning, "Warnings")] {
            let messages = self.messages_by_severity(severity);
            if messages.is_empty() {
                continue;
            }
            summary.push_str(&format!("\n\n{heading}:"));
            for msg in messages {
                summary.push_str(&format!("\n  - {}: {}", msg.code, msg.text));
            }
        }

        summary
    }
}

/// Build a JSON context map from key/value pairs
#[macro_export]
macro_rules! context {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = serde_json::Map::new();
        $( map.insert($key.to_string(), serde_json::json!($value)); )*
        map
    }};
}

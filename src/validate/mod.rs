//! Document validation.
//!
//! Validators never fail: every finding is collected into a
//! [`ValidationResult`] grouped by [`ErrorCategory`], so one pass reports
//! every problem.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::error::{Result, VerifactuError};

mod messages;
pub mod schema;
mod verifactu;
mod verifactu_schema;

#[cfg(feature = "ubl")]
pub mod ubl;

pub use messages::{explain, humanize, label, suggest};
pub use verifactu::{DocumentKind, VerifactuValidator};
pub use verifactu_schema::verifactu_schema;

#[cfg(feature = "ubl")]
pub use ubl::{UblDocumentKind, UblValidator};

/// Where a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Schema,
    Structural,
    Business,
    Stylesheet,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl ErrorCategory {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Schema => Severity::High,
            Self::Structural | Self::General | Self::Stylesheet => Severity::Medium,
            Self::Business => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Structural => "structural",
            Self::Business => "business",
            Self::Stylesheet => "stylesheet",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Findings of one validation pass, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<ErrorCategory, Vec<String>>,
}

/// One category in an [`ErrorExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryExport {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub count: usize,
    pub messages: Vec<String>,
}

/// Grouped and counted findings, for logs and UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorExport {
    pub total: usize,
    pub categories: Vec<CategoryExport>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: ErrorCategory, message: impl Into<String>) {
        self.errors.entry(category).or_default().push(message.into());
    }

    pub fn extend(&mut self, category: ErrorCategory, messages: impl IntoIterator<Item = String>) {
        for m in messages {
            self.add(category, m);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn count(&self, category: ErrorCategory) -> usize {
        self.errors.get(&category).map_or(0, Vec::len)
    }

    pub fn messages(&self, category: ErrorCategory) -> &[String] {
        self.errors.get(&category).map_or(&[], Vec::as_slice)
    }

    pub fn severity_of(category: ErrorCategory) -> Severity {
        category.severity()
    }

    /// Highest severity present, if any.
    pub fn worst_severity(&self) -> Option<Severity> {
        self.errors
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, _)| c.severity())
            .min()
    }

    /// One-line summary, e.g.
    /// `Validation failed with 3 total error(s): schema: 2, business: 1`.
    pub fn summary(&self) -> String {
        if self.is_valid() {
            return "Validation passed".to_string();
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, v)| format!("{c}: {}", v.len()))
            .collect();
        format!(
            "Validation failed with {} total error(s): {}",
            self.total(),
            parts.join(", ")
        )
    }

    pub fn grouped(&self) -> ErrorExport {
        ErrorExport {
            total: self.total(),
            categories: self
                .errors
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(c, v)| CategoryExport {
                    category: *c,
                    severity: c.severity(),
                    count: v.len(),
                    messages: v.clone(),
                })
                .collect(),
        }
    }

    /// [`grouped`](Self::grouped) as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.grouped())
            .map_err(|e| VerifactuError::Validation(format!("JSON export failed: {e}")))
    }
}

/// A stateless validator over XML text.
pub trait DocumentValidator {
    fn validate(&self, xml: &str) -> ValidationResult;
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Action a compliance pass recommends for a flagged line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Approve,
    Adjust,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A compliance rule violation attached to a flagged item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub rule_id: String,
    pub rule_name: String,
    pub description: String,
    pub severity: Severity,
}

/// Verdict for a single flagged line item.
///
/// This is *not* a domain event. It is a recommendation that higher layers
/// may map into a domain command without this crate knowing about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub line_item_id: String,
    /// Model score in \[0, 100\], two decimals.
    pub ai_score: f64,
    pub action: RecommendedAction,
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: Option<f64>,
    pub issues: Vec<ComplianceIssue>,
}

/// Full output of one compliance pass over an invoice snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub invoice_id: String,
    /// Number of line items inspected (the whole snapshot).
    pub inspected_count: usize,
    pub results: Vec<ComplianceResult>,
    /// Seed used for the pass, so a report is reproducible.
    pub seed: u64,
}

impl ComplianceReport {
    pub fn flagged_count(&self) -> usize {
        self.results.len()
    }
}

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("invalid job input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

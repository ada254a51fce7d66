use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lexbill_core::DomainError;

/// LEDES file format of an uploaded invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedesFormat {
    #[serde(rename = "1998B")]
    Ledes1998B,
    #[serde(rename = "2.0")]
    Ledes20,
    #[serde(rename = "2.1")]
    Ledes21,
}

impl core::fmt::Display for LedesFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            LedesFormat::Ledes1998B => "1998B",
            LedesFormat::Ledes20 => "2.0",
            LedesFormat::Ledes21 => "2.1",
        };
        f.write_str(s)
    }
}

/// Line item identifier (unique within a tenant, not just an invoice).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(Uuid);

impl LineItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LineItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LineItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for LineItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("LineItemId: {e}")))
    }
}

/// Review status of a single line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemStatus {
    Pending,
    Approved,
    Adjusted,
    Rejected,
    Reviewed,
}

/// Action recommended by a compliance pass for a flagged item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiAction {
    Approve,
    Adjust,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A compliance rule violation recorded against a line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceIssue {
    pub rule_id: String,
    pub rule_name: String,
    pub description: String,
    pub severity: Severity,
}

/// A billed line item as parsed from the LEDES file.
///
/// `hours`, `rate` and `amount` are immutable once ingested; review decisions
/// are recorded in the `adjusted_*` fields and `status`. `ai_score`/`ai_action`
/// stay `None` until a compliance pass touches the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub ledes_row_num: u32,
    pub task_code: String,
    pub activity_code: String,
    pub expense_code: Option<String>,
    pub hours: f64,
    pub rate: f64,
    pub amount: f64,
    pub narrative: String,
    pub tax: f64,
    pub status: LineItemStatus,
    pub ai_score: Option<f64>,
    pub ai_action: Option<AiAction>,
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: Option<f64>,
    pub reviewer_comment: Option<String>,
    pub timekeeper_id: String,
    pub timekeeper_name: String,
    pub timekeeper_classification: String,
    pub service_date: NaiveDate,
}

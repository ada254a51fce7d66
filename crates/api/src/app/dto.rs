use serde::Deserialize;
use serde_json::json;

use lexbill_billing::{AiAction, LineItem, LineItemStatus};
use lexbill_infra::InvoiceReadModel;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UploadInvoiceRequest {
    pub file_name: String,
    /// Raw file content. Accepted but not parsed; ingestion synthesizes the
    /// line items deterministically from `seed`.
    #[allow(dead_code)]
    pub content: Option<String>,
    pub line_count: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustLineRequest {
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: Option<f64>,
    pub reviewer_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectLineRequest {
    pub reviewer_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReviewedRequest {
    pub line_item_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectInvoiceRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunComplianceRequest {
    pub seed: Option<u64>,
}

/// Query-string filters for `GET /invoices/{id}/lines`.
#[derive(Debug, Default, Deserialize)]
pub struct LineItemQuery {
    pub status: Option<LineItemStatus>,
    pub task_code: Option<String>,
    pub ai_action: Option<AiAction>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub search: Option<String>,
}

impl LineItemQuery {
    /// Whether a line item passes every supplied filter.
    ///
    /// `search` is a case-insensitive substring match over the timekeeper
    /// name, narrative and task code.
    pub fn matches(&self, item: &LineItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(task_code) = &self.task_code {
            if &item.task_code != task_code {
                return false;
            }
        }
        if let Some(action) = self.ai_action {
            if item.ai_action != Some(action) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if item.amount < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if item.amount > max {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = item.timekeeper_name.to_lowercase().contains(&needle)
                || item.narrative.to_lowercase().contains(&needle)
                || item.task_code.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

// -------------------------
// Response mapping
// -------------------------

/// Header-only view used by list endpoints.
pub fn invoice_summary_to_json(rm: &InvoiceReadModel) -> serde_json::Value {
    json!({
        "id": rm.invoice_id.to_string(),
        "vendor_id": rm.vendor_id,
        "client_matter_id": rm.client_matter_id,
        "invoice_number": rm.invoice_number,
        "invoice_date": rm.invoice_date,
        "format": rm.format,
        "status": rm.status,
        "total_original": rm.total_original,
        "total_adjusted": rm.total_adjusted,
        "line_count": rm.line_items.len(),
    })
}

/// Full view including line items.
pub fn invoice_to_json(rm: &InvoiceReadModel) -> serde_json::Value {
    let mut v = invoice_summary_to_json(rm);
    if let Some(obj) = v.as_object_mut() {
        obj.insert(
            "line_items".to_string(),
            json!(rm.line_items.iter().map(line_item_to_json).collect::<Vec<_>>()),
        );
    }
    v
}

pub fn line_item_to_json(item: &LineItem) -> serde_json::Value {
    json!({
        "id": item.id.to_string(),
        "ledes_row_num": item.ledes_row_num,
        "task_code": item.task_code,
        "activity_code": item.activity_code,
        "expense_code": item.expense_code,
        "hours": item.hours,
        "rate": item.rate,
        "amount": item.amount,
        "narrative": item.narrative,
        "tax": item.tax,
        "status": item.status,
        "ai_score": item.ai_score,
        "ai_action": item.ai_action,
        "adjusted_hours": item.adjusted_hours,
        "adjusted_rate": item.adjusted_rate,
        "adjusted_amount": item.adjusted_amount,
        "reviewer_comment": item.reviewer_comment,
        "timekeeper_id": item.timekeeper_id,
        "timekeeper_name": item.timekeeper_name,
        "timekeeper_classification": item.timekeeper_classification,
        "service_date": item.service_date,
    })
}

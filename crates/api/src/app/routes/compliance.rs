use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use lexbill_auth::Permission;
use lexbill_billing::{
    AiAction, ComplianceFinding, ComplianceIssue, Invoice, InvoiceCommand, InvoiceId,
    RecordComplianceFindings, Severity,
};
use lexbill_compliance::{
    ComplianceError, ComplianceReport, ComplianceScheduler, InvoiceReviewJob, InvoiceSnapshot,
    LineItemSnapshot, LocalComplianceScheduler, RecommendedAction,
};
use lexbill_core::AggregateId;
use lexbill_infra::InvoiceReadModel;

use crate::app::errors;
use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::dto;

/// POST /invoices/{id}/compliance/run
///
/// Runs a seeded review pass over the current read model, then records the
/// findings on the aggregate. The report is returned directly so the caller
/// does not have to wait for the projection to catch up.
pub async fn run_compliance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RunComplianceRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };
    let invoice_id = InvoiceId::new(agg);

    let rm = match services.invoices_get(tenant.tenant_id(), &invoice_id) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    };

    let seed = body
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    let snapshot = snapshot_from_read_model(tenant.tenant_id(), &rm);

    let scheduler = LocalComplianceScheduler::for_tenant(tenant.tenant_id());
    let job = InvoiceReviewJob::new(tenant.tenant_id(), snapshot, seed);
    let report = match scheduler.run(job) {
        Ok(report) => report,
        Err(ComplianceError::InvalidInput(msg)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", msg);
        }
        Err(ComplianceError::Internal(msg)) => {
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "compliance_error", msg);
        }
    };

    let findings = match findings_from_report(&report) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::RecordComplianceFindings(RecordComplianceFindings {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        findings,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("compliance.run")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Invoice>(
        tenant.tenant_id(),
        agg,
        "billing.invoice",
        cmd_auth.inner,
        |_t, aggregate_id| Invoice::empty(InvoiceId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let flagged_count = report.flagged_count();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "report": report,
            "flagged_count": flagged_count,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

fn snapshot_from_read_model(
    tenant_id: lexbill_core::TenantId,
    rm: &InvoiceReadModel,
) -> InvoiceSnapshot {
    InvoiceSnapshot {
        tenant_id,
        invoice_id: rm.invoice_id.to_string(),
        line_items: rm
            .line_items
            .iter()
            .map(|item| LineItemSnapshot {
                line_item_id: item.id.to_string(),
                ledes_row_num: item.ledes_row_num,
                hours: item.hours,
                rate: item.rate,
                amount: item.amount,
            })
            .collect(),
    }
}

/// Map review verdicts back onto domain findings.
///
/// The snapshot ids were rendered from our own line item ids, so a parse
/// failure here is a bug, not bad input.
fn findings_from_report(
    report: &ComplianceReport,
) -> Result<Vec<ComplianceFinding>, axum::response::Response> {
    let mut findings = Vec::with_capacity(report.results.len());
    for result in &report.results {
        let line_item_id = result.line_item_id.parse().map_err(|_| {
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "compliance_error",
                "review result references an unparseable line item id",
            )
        })?;

        findings.push(ComplianceFinding {
            line_item_id,
            ai_score: result.ai_score,
            action: map_action(result.action),
            adjusted_hours: result.adjusted_hours,
            adjusted_rate: result.adjusted_rate,
            adjusted_amount: result.adjusted_amount,
            issues: result
                .issues
                .iter()
                .map(|issue| ComplianceIssue {
                    rule_id: issue.rule_id.clone(),
                    rule_name: issue.rule_name.clone(),
                    description: issue.description.clone(),
                    severity: map_severity(issue.severity),
                })
                .collect(),
        });
    }
    Ok(findings)
}

fn map_action(action: RecommendedAction) -> AiAction {
    match action {
        RecommendedAction::Approve => AiAction::Approve,
        RecommendedAction::Adjust => AiAction::Adjust,
        RecommendedAction::Reject => AiAction::Reject,
    }
}

fn map_severity(severity: lexbill_compliance::result::Severity) -> Severity {
    match severity {
        lexbill_compliance::result::Severity::Low => Severity::Low,
        lexbill_compliance::result::Severity::Medium => Severity::Medium,
        lexbill_compliance::result::Severity::High => Severity::High,
    }
}

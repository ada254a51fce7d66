use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use lexbill_auth::Permission;
use lexbill_billing::{
    ApproveInvoice, IngestInvoice, Invoice, InvoiceCommand, InvoiceId, RejectInvoice,
    sample::{self, DEFAULT_LINE_COUNT, MAX_LINE_COUNT},
};
use lexbill_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::routes::{compliance, lines};
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(upload_invoice).get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/approve", post(approve_invoice))
        .route("/:id/reject", post(reject_invoice))
        .route("/:id/audit", get(audit_trail))
        .route("/:id/lines", get(lines::list_lines))
        .route("/:id/lines/reviewed", post(lines::mark_reviewed))
        .route("/:id/lines/:line_id/adjust", post(lines::adjust_line))
        .route("/:id/lines/:line_id/accept", post(lines::accept_line))
        .route("/:id/lines/:line_id/reject", post(lines::reject_line))
        .route("/:id/compliance/run", post(compliance::run_compliance))
}

fn has_supported_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".txt") || lower.ends_with(".csv") || lower.ends_with(".ledes")
}

pub async fn upload_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::UploadInvoiceRequest>,
) -> axum::response::Response {
    if !has_supported_extension(&body.file_name) {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_file_format",
            "file must be a .txt, .csv or .ledes LEDES export",
        );
    }

    let line_count = body.line_count.unwrap_or(DEFAULT_LINE_COUNT);
    if line_count == 0 || line_count > MAX_LINE_COUNT {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("line_count must be between 1 and {MAX_LINE_COUNT}"),
        );
    }
    let seed = body
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    let generated = sample::generate_sample_invoice(line_count, seed);

    let invoice_agg = AggregateId::new();
    let invoice_id = InvoiceId::new(invoice_agg);

    let cmd = InvoiceCommand::IngestInvoice(IngestInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id,
        vendor_id: generated.vendor_id,
        client_matter_id: generated.client_matter_id,
        invoice_number: generated.invoice_number,
        invoice_date: generated.invoice_date,
        format: generated.format,
        line_items: generated.line_items,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("invoices.upload")],
    };
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Invoice>(
        tenant.tenant_id(),
        invoice_agg,
        "billing.invoice",
        cmd_auth.inner,
        |_t, aggregate_id| Invoice::empty(InvoiceId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": invoice_agg.to_string(),
            "line_count": line_count,
            "seed": seed,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .invoices_list(tenant.tenant_id())
        .iter()
        .map(dto::invoice_summary_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };
    let invoice_id = InvoiceId::new(agg);
    match services.invoices_get(tenant.tenant_id(), &invoice_id) {
        Some(rm) => (StatusCode::OK, Json(dto::invoice_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn approve_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let cmd = InvoiceCommand::ApproveInvoice(ApproveInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("invoices.approve")],
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

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn reject_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RejectInvoiceRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let cmd = InvoiceCommand::RejectInvoice(RejectInvoice {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        reason: body.reason,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("invoices.reject")],
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

    (
        StatusCode::OK,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

/// GET /invoices/{id}/audit
///
/// The raw event stream for an invoice, oldest first.
pub async fn audit_trail(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id");
        }
    };

    let events = match services.aggregate_events(tenant.tenant_id(), agg) {
        Ok(evs) => evs,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                format!("{e:?}"),
            );
        }
    };
    if events.is_empty() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found");
    }

    let entries = events
        .iter()
        .map(|ev| {
            serde_json::json!({
                "event_id": ev.event_id.to_string(),
                "sequence_number": ev.sequence_number,
                "event_type": ev.event_type,
                "occurred_at": ev.occurred_at,
                "payload": ev.payload,
            })
        })
        .collect::<Vec<_>>();

    (StatusCode::OK, Json(serde_json::json!({ "entries": entries }))).into_response()
}

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use lexbill_auth::Permission;
use lexbill_billing::{
    AcceptLineItem, AdjustLineItem, Invoice, InvoiceCommand, InvoiceId, LineItemId,
    MarkLineItemsReviewed, RejectLineItem,
};
use lexbill_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn parse_invoice_id(id: &str) -> Result<AggregateId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id")
    })
}

fn parse_line_id(id: &str) -> Result<LineItemId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid line item id")
    })
}

/// GET /invoices/{id}/lines
pub async fn list_lines(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::LineItemQuery>,
) -> axum::response::Response {
    let agg = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let rm = match services.invoices_get(tenant.tenant_id(), &InvoiceId::new(agg)) {
        Some(rm) => rm,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    };

    let total = rm.line_items.len();
    let items = rm
        .line_items
        .iter()
        .filter(|item| query.matches(item))
        .map(dto::line_item_to_json)
        .collect::<Vec<_>>();
    let matched = items.len();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "items": items,
            "matched": matched,
            "total": total,
        })),
    )
        .into_response()
}

/// POST /invoices/{id}/lines/{line_id}/adjust
pub async fn adjust_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::AdjustLineRequest>,
) -> axum::response::Response {
    let agg = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let line_item_id = match parse_line_id(&line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::AdjustLineItem(AdjustLineItem {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        line_item_id,
        adjusted_hours: body.adjusted_hours,
        adjusted_rate: body.adjusted_rate,
        adjusted_amount: body.adjusted_amount,
        reviewer_comment: body.reviewer_comment,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("lines.adjust")],
    };
    dispatch_line_command(&services, &tenant, &principal, agg, cmd_auth)
}

/// POST /invoices/{id}/lines/{line_id}/accept
pub async fn accept_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
) -> axum::response::Response {
    let agg = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let line_item_id = match parse_line_id(&line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::AcceptLineItem(AcceptLineItem {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        line_item_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("lines.accept")],
    };
    dispatch_line_command(&services, &tenant, &principal, agg, cmd_auth)
}

/// POST /invoices/{id}/lines/{line_id}/reject
pub async fn reject_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::RejectLineRequest>,
) -> axum::response::Response {
    let agg = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let line_item_id = match parse_line_id(&line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let cmd = InvoiceCommand::RejectLineItem(RejectLineItem {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        line_item_id,
        reviewer_comment: body.reviewer_comment,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("lines.reject")],
    };
    dispatch_line_command(&services, &tenant, &principal, agg, cmd_auth)
}

/// POST /invoices/{id}/lines/reviewed (bulk)
pub async fn mark_reviewed(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MarkReviewedRequest>,
) -> axum::response::Response {
    let agg = match parse_invoice_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut line_item_ids = Vec::with_capacity(body.line_item_ids.len());
    for raw in &body.line_item_ids {
        match parse_line_id(raw) {
            Ok(v) => line_item_ids.push(v),
            Err(resp) => return resp,
        }
    }

    let cmd = InvoiceCommand::MarkLineItemsReviewed(MarkLineItemsReviewed {
        tenant_id: tenant.tenant_id(),
        invoice_id: InvoiceId::new(agg),
        line_item_ids,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("invoices.review")],
    };
    dispatch_line_command(&services, &tenant, &principal, agg, cmd_auth)
}

fn dispatch_line_command(
    services: &AppServices,
    tenant: &crate::context::TenantContext,
    principal: &crate::context::PrincipalContext,
    agg: AggregateId,
    cmd_auth: CmdAuth<InvoiceCommand>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::authorize_command(tenant, principal, &cmd_auth) {
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

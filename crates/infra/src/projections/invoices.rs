use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use lexbill_billing::{
    AiAction, InvoiceEvent, InvoiceId, InvoiceStatus, LedesFormat, LineItem, LineItemStatus,
    reconcile,
};
use lexbill_core::{AggregateId, TenantId};
use lexbill_events::EventEnvelope;

use crate::read_model::TenantStore;

/// Queryable invoice read model (header + line items + reconciled totals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub vendor_id: String,
    pub client_matter_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub format: LedesFormat,
    pub status: InvoiceStatus,
    pub total_original: f64,
    pub total_adjusted: f64,
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum InvoiceProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Projection from `billing.invoice` event streams onto [`InvoiceReadModel`]s.
///
/// Envelope handling is idempotent per stream: a sequence number at or below
/// the cursor is skipped, a gap is an error (the caller should rebuild).
#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors
                .get(&CursorKey {
                    tenant_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InvoiceProjectionError> {
        if envelope.aggregate_type() != "billing.invoice" {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, invoice_id) = event_scope(&ev);
        if event_tenant != tenant_id {
            return Err(InvoiceProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if invoice_id.0 != aggregate_id {
            return Err(InvoiceProjectionError::TenantIsolation(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match &ev {
            InvoiceEvent::InvoiceIngested(e) => {
                let mut rm = InvoiceReadModel {
                    invoice_id: e.invoice_id,
                    vendor_id: e.vendor_id.clone(),
                    client_matter_id: e.client_matter_id.clone(),
                    invoice_number: e.invoice_number.clone(),
                    invoice_date: e.invoice_date,
                    format: e.format,
                    status: InvoiceStatus::Pending,
                    total_original: 0.0,
                    total_adjusted: 0.0,
                    line_items: e.line_items.clone(),
                };
                recompute_totals(&mut rm);
                self.store.upsert(tenant_id, e.invoice_id, rm);
            }
            _ => {
                let Some(mut rm) = self.store.get(tenant_id, &invoice_id) else {
                    // Cursor checks guarantee ingestion arrives first; a
                    // missing model means the tenant was cleared mid-stream.
                    tracing::warn!(%invoice_id, "projection update for unknown invoice, skipping");
                    self.update_cursor(tenant_id, aggregate_id, seq);
                    return Ok(());
                };
                apply_to_read_model(&mut rm, &ev);
                recompute_totals(&mut rm);
                self.store.upsert(tenant_id, invoice_id, rm);
            }
        }

        self.update_cursor(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), InvoiceProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
                self.clear_cursors(t);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

fn event_scope(ev: &InvoiceEvent) -> (TenantId, InvoiceId) {
    match ev {
        InvoiceEvent::InvoiceIngested(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::LineItemAdjusted(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::LineItemAccepted(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::LineItemRejected(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::LineItemsMarkedReviewed(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::ComplianceFindingsRecorded(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::InvoiceApproved(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::InvoiceRejected(e) => (e.tenant_id, e.invoice_id),
    }
}

fn apply_to_read_model(rm: &mut InvoiceReadModel, ev: &InvoiceEvent) {
    match ev {
        InvoiceEvent::InvoiceIngested(_) => {}
        InvoiceEvent::LineItemAdjusted(e) => {
            if let Some(item) = rm.line_items.iter_mut().find(|i| i.id == e.line_item_id) {
                item.status = LineItemStatus::Adjusted;
                item.adjusted_hours = e.adjusted_hours;
                item.adjusted_rate = e.adjusted_rate;
                item.adjusted_amount = Some(e.adjusted_amount);
                item.reviewer_comment = e.reviewer_comment.clone();
            }
        }
        InvoiceEvent::LineItemAccepted(e) => {
            if let Some(item) = rm.line_items.iter_mut().find(|i| i.id == e.line_item_id) {
                item.status = LineItemStatus::Approved;
            }
        }
        InvoiceEvent::LineItemRejected(e) => {
            if let Some(item) = rm.line_items.iter_mut().find(|i| i.id == e.line_item_id) {
                item.status = LineItemStatus::Rejected;
                item.reviewer_comment = e.reviewer_comment.clone();
            }
        }
        InvoiceEvent::LineItemsMarkedReviewed(e) => {
            for id in &e.line_item_ids {
                if let Some(item) = rm.line_items.iter_mut().find(|i| i.id == *id) {
                    item.status = LineItemStatus::Reviewed;
                }
            }
        }
        InvoiceEvent::ComplianceFindingsRecorded(e) => {
            for finding in &e.findings {
                if let Some(item) = rm
                    .line_items
                    .iter_mut()
                    .find(|i| i.id == finding.line_item_id)
                {
                    item.ai_score = Some(finding.ai_score);
                    item.ai_action = Some(finding.action);
                    match finding.action {
                        AiAction::Approve => item.status = LineItemStatus::Approved,
                        AiAction::Adjust => {
                            item.status = LineItemStatus::Adjusted;
                            item.adjusted_hours = finding.adjusted_hours;
                            item.adjusted_rate = finding.adjusted_rate;
                            item.adjusted_amount = finding.adjusted_amount;
                        }
                        AiAction::Reject => item.status = LineItemStatus::Rejected,
                    }
                }
            }
            if rm.status == InvoiceStatus::Pending {
                rm.status = InvoiceStatus::Reviewed;
            }
        }
        InvoiceEvent::InvoiceApproved(_) => rm.status = InvoiceStatus::Approved,
        InvoiceEvent::InvoiceRejected(_) => rm.status = InvoiceStatus::Rejected,
    }
}

fn recompute_totals(rm: &mut InvoiceReadModel) {
    let totals = reconcile(&rm.line_items);
    rm.total_original = totals.total_original;
    rm.total_adjusted = totals.total_adjusted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use lexbill_billing::{
        Invoice, InvoiceCommand, RejectLineItem, round2, sample,
    };
    use lexbill_core::Aggregate;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Projection = InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>;

    fn projection() -> Projection {
        InvoicesProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        seq: u64,
        ev: &InvoiceEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            "billing.invoice".to_string(),
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn ingested_events(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> (Invoice, Vec<InvoiceEvent>) {
        let generated = sample::generate_sample_invoice(4, 5);
        let invoice_id = InvoiceId::new(aggregate_id);
        let mut invoice = Invoice::empty(invoice_id);

        let events = invoice
            .handle(&InvoiceCommand::IngestInvoice(lexbill_billing::IngestInvoice {
                tenant_id,
                invoice_id,
                vendor_id: generated.vendor_id,
                client_matter_id: generated.client_matter_id,
                invoice_number: generated.invoice_number,
                invoice_date: generated.invoice_date,
                format: generated.format,
                line_items: generated.line_items,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            invoice.apply(e);
        }
        (invoice, events)
    }

    #[test]
    fn ingestion_creates_the_read_model_with_totals() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let (invoice, events) = ingested_events(tenant_id, aggregate_id);

        p.apply_envelope(&envelope(tenant_id, aggregate_id, 1, &events[0]))
            .unwrap();

        let rm = p.get(tenant_id, &invoice.id_typed()).unwrap();
        assert_eq!(rm.status, InvoiceStatus::Pending);
        assert_eq!(rm.line_items.len(), 4);
        assert_eq!(rm.total_original, invoice.totals().total_original);
        assert_eq!(rm.total_adjusted, rm.total_original);
    }

    #[test]
    fn line_rejection_updates_the_adjusted_total() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let (mut invoice, events) = ingested_events(tenant_id, aggregate_id);
        let invoice_id = invoice.id_typed();
        let line = invoice.line_items()[0].clone();

        p.apply_envelope(&envelope(tenant_id, aggregate_id, 1, &events[0]))
            .unwrap();

        let reject_events = invoice
            .handle(&InvoiceCommand::RejectLineItem(RejectLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line.id,
                reviewer_comment: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        invoice.apply(&reject_events[0]);

        p.apply_envelope(&envelope(tenant_id, aggregate_id, 2, &reject_events[0]))
            .unwrap();

        let rm = p.get(tenant_id, &invoice_id).unwrap();
        assert_eq!(
            rm.total_adjusted,
            round2(rm.total_original - line.amount)
        );
        assert_eq!(rm.line_items[0].status, LineItemStatus::Rejected);
    }

    #[test]
    fn duplicate_envelopes_are_skipped() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let (invoice, events) = ingested_events(tenant_id, aggregate_id);

        let env = envelope(tenant_id, aggregate_id, 1, &events[0]);
        p.apply_envelope(&env).unwrap();
        p.apply_envelope(&env).unwrap();

        assert_eq!(p.list(tenant_id).len(), 1);
        let rm = p.get(tenant_id, &invoice.id_typed()).unwrap();
        assert_eq!(rm.line_items.len(), 4);
    }

    #[test]
    fn sequence_gaps_are_an_error() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();
        let (_invoice, events) = ingested_events(tenant_id, aggregate_id);

        p.apply_envelope(&envelope(tenant_id, aggregate_id, 1, &events[0]))
            .unwrap();

        let err = p
            .apply_envelope(&envelope(tenant_id, aggregate_id, 3, &events[0]))
            .unwrap_err();
        assert!(matches!(
            err,
            InvoiceProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));
    }

    #[test]
    fn foreign_aggregate_types_are_ignored() {
        let p = projection();
        let tenant_id = TenantId::new();
        let aggregate_id = AggregateId::new();

        let env = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            "other.aggregate".to_string(),
            1,
            serde_json::json!({}),
        );
        p.apply_envelope(&env).unwrap();
        assert!(p.list(tenant_id).is_empty());
    }
}

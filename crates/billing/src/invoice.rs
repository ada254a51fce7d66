use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use lexbill_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use lexbill_events::Event;

use crate::line_item::{
    AiAction, ComplianceIssue, LedesFormat, LineItem, LineItemId, LineItemStatus,
};
use crate::reconcile::{InvoiceTotals, reconcile, round2};

/// Invoice identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice review lifecycle.
///
/// A compliance run moves a pending invoice to `Reviewed`; `Approved` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Reviewed,
    Approved,
    Rejected,
}

/// Aggregate root: an uploaded LEDES invoice under review.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    vendor_id: String,
    client_matter_id: String,
    invoice_number: String,
    invoice_date: Option<NaiveDate>,
    format: LedesFormat,
    status: InvoiceStatus,
    line_items: Vec<LineItem>,
    totals: InvoiceTotals,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            vendor_id: String::new(),
            client_matter_id: String::new(),
            invoice_number: String::new(),
            invoice_date: None,
            format: LedesFormat::Ledes1998B,
            status: InvoiceStatus::Pending,
            line_items: Vec::new(),
            totals: InvoiceTotals {
                total_original: 0.0,
                total_adjusted: 0.0,
            },
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn totals(&self) -> InvoiceTotals {
        self.totals
    }

    /// Invariant: a finalized invoice accepts no further review edits.
    pub fn is_finalized(&self) -> bool {
        matches!(self.status, InvoiceStatus::Approved | InvoiceStatus::Rejected)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IngestInvoice (create from an upload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub vendor_id: String,
    pub client_matter_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub format: LedesFormat,
    pub line_items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustLineItem.
///
/// An explicit `adjusted_amount` wins; otherwise the amount is computed from
/// the adjusted (falling back to original) hours and rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustLineItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: Option<f64>,
    pub reviewer_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptLineItem (quick accept at the original amount).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptLineItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectLineItem (contributes zero to the adjusted total).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectLineItem {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub reviewer_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkLineItemsReviewed (bulk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkLineItemsReviewed {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_ids: Vec<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// One compliance verdict for a flagged line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFinding {
    pub line_item_id: LineItemId,
    pub ai_score: f64,
    pub action: AiAction,
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: Option<f64>,
    pub issues: Vec<ComplianceIssue>,
}

/// Command: RecordComplianceFindings.
///
/// Applies each recommended action to its line item and moves a pending
/// invoice to `Reviewed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordComplianceFindings {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub findings: Vec<ComplianceFinding>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveInvoice (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectInvoice (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IngestInvoice(IngestInvoice),
    AdjustLineItem(AdjustLineItem),
    AcceptLineItem(AcceptLineItem),
    RejectLineItem(RejectLineItem),
    MarkLineItemsReviewed(MarkLineItemsReviewed),
    RecordComplianceFindings(RecordComplianceFindings),
    ApproveInvoice(ApproveInvoice),
    RejectInvoice(RejectInvoice),
}

/// Event: InvoiceIngested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceIngested {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub vendor_id: String,
    pub client_matter_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub format: LedesFormat,
    pub line_items: Vec<LineItem>,
    pub total_original: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemAdjusted. `adjusted_amount` is the resolved amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemAdjusted {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub adjusted_hours: Option<f64>,
    pub adjusted_rate: Option<f64>,
    pub adjusted_amount: f64,
    pub reviewer_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemAccepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemAccepted {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRejected {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_id: LineItemId,
    pub reviewer_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemsMarkedReviewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemsMarkedReviewed {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub line_item_ids: Vec<LineItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ComplianceFindingsRecorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceFindingsRecorded {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub findings: Vec<ComplianceFinding>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRejected {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIngested(InvoiceIngested),
    LineItemAdjusted(LineItemAdjusted),
    LineItemAccepted(LineItemAccepted),
    LineItemRejected(LineItemRejected),
    LineItemsMarkedReviewed(LineItemsMarkedReviewed),
    ComplianceFindingsRecorded(ComplianceFindingsRecorded),
    InvoiceApproved(InvoiceApproved),
    InvoiceRejected(InvoiceRejected),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIngested(_) => "billing.invoice.ingested",
            InvoiceEvent::LineItemAdjusted(_) => "billing.invoice.line_adjusted",
            InvoiceEvent::LineItemAccepted(_) => "billing.invoice.line_accepted",
            InvoiceEvent::LineItemRejected(_) => "billing.invoice.line_rejected",
            InvoiceEvent::LineItemsMarkedReviewed(_) => "billing.invoice.lines_marked_reviewed",
            InvoiceEvent::ComplianceFindingsRecorded(_) => "billing.invoice.compliance_recorded",
            InvoiceEvent::InvoiceApproved(_) => "billing.invoice.approved",
            InvoiceEvent::InvoiceRejected(_) => "billing.invoice.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIngested(e) => e.occurred_at,
            InvoiceEvent::LineItemAdjusted(e) => e.occurred_at,
            InvoiceEvent::LineItemAccepted(e) => e.occurred_at,
            InvoiceEvent::LineItemRejected(e) => e.occurred_at,
            InvoiceEvent::LineItemsMarkedReviewed(e) => e.occurred_at,
            InvoiceEvent::ComplianceFindingsRecorded(e) => e.occurred_at,
            InvoiceEvent::InvoiceApproved(e) => e.occurred_at,
            InvoiceEvent::InvoiceRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIngested(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.vendor_id = e.vendor_id.clone();
                self.client_matter_id = e.client_matter_id.clone();
                self.invoice_number = e.invoice_number.clone();
                self.invoice_date = Some(e.invoice_date);
                self.format = e.format;
                self.line_items = e.line_items.clone();
                self.status = InvoiceStatus::Pending;
                self.created = true;
            }
            InvoiceEvent::LineItemAdjusted(e) => {
                if let Some(item) = self.find_item_mut(e.line_item_id) {
                    item.status = LineItemStatus::Adjusted;
                    item.adjusted_hours = e.adjusted_hours;
                    item.adjusted_rate = e.adjusted_rate;
                    item.adjusted_amount = Some(e.adjusted_amount);
                    item.reviewer_comment = e.reviewer_comment.clone();
                }
            }
            InvoiceEvent::LineItemAccepted(e) => {
                if let Some(item) = self.find_item_mut(e.line_item_id) {
                    item.status = LineItemStatus::Approved;
                }
            }
            InvoiceEvent::LineItemRejected(e) => {
                if let Some(item) = self.find_item_mut(e.line_item_id) {
                    item.status = LineItemStatus::Rejected;
                    item.reviewer_comment = e.reviewer_comment.clone();
                }
            }
            InvoiceEvent::LineItemsMarkedReviewed(e) => {
                for id in &e.line_item_ids {
                    if let Some(item) = self.find_item_mut(*id) {
                        item.status = LineItemStatus::Reviewed;
                    }
                }
            }
            InvoiceEvent::ComplianceFindingsRecorded(e) => {
                for finding in &e.findings {
                    if let Some(item) = self.find_item_mut(finding.line_item_id) {
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
                if self.status == InvoiceStatus::Pending {
                    self.status = InvoiceStatus::Reviewed;
                }
            }
            InvoiceEvent::InvoiceApproved(_) => {
                self.status = InvoiceStatus::Approved;
            }
            InvoiceEvent::InvoiceRejected(_) => {
                self.status = InvoiceStatus::Rejected;
            }
        }

        // Totals always reflect the current line items.
        self.totals = reconcile(&self.line_items);

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IngestInvoice(cmd) => self.handle_ingest(cmd),
            InvoiceCommand::AdjustLineItem(cmd) => self.handle_adjust_line(cmd),
            InvoiceCommand::AcceptLineItem(cmd) => self.handle_accept_line(cmd),
            InvoiceCommand::RejectLineItem(cmd) => self.handle_reject_line(cmd),
            InvoiceCommand::MarkLineItemsReviewed(cmd) => self.handle_mark_reviewed(cmd),
            InvoiceCommand::RecordComplianceFindings(cmd) => self.handle_record_findings(cmd),
            InvoiceCommand::ApproveInvoice(cmd) => self.handle_approve(cmd),
            InvoiceCommand::RejectInvoice(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Invoice {
    fn find_item_mut(&mut self, id: LineItemId) -> Option<&mut LineItem> {
        self.line_items.iter_mut().find(|item| item.id == id)
    }

    fn find_item(&self, id: LineItemId) -> Result<&LineItem, DomainError> {
        self.line_items
            .iter()
            .find(|item| item.id == id)
            .ok_or(DomainError::NotFound)
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_reviewable(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_invoice_id(invoice_id)?;

        if self.is_finalized() {
            return Err(DomainError::invariant(
                "invoice is finalized and accepts no further edits",
            ));
        }
        Ok(())
    }

    fn handle_ingest(&self, cmd: &IngestInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already ingested"));
        }

        if cmd.line_items.is_empty() {
            return Err(DomainError::validation(
                "cannot ingest invoice without line items",
            ));
        }

        let mut total_original = 0.0;
        for item in &cmd.line_items {
            ensure_billed_number("hours", item.hours)?;
            ensure_billed_number("rate", item.rate)?;
            ensure_billed_number("amount", item.amount)?;
            ensure_billed_number("tax", item.tax)?;
            total_original += item.amount;
        }

        Ok(vec![InvoiceEvent::InvoiceIngested(InvoiceIngested {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            vendor_id: cmd.vendor_id.clone(),
            client_matter_id: cmd.client_matter_id.clone(),
            invoice_number: cmd.invoice_number.clone(),
            invoice_date: cmd.invoice_date,
            format: cmd.format,
            line_items: cmd.line_items.clone(),
            total_original: round2(total_original),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust_line(&self, cmd: &AdjustLineItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_reviewable(cmd.tenant_id, cmd.invoice_id)?;
        let item = self.find_item(cmd.line_item_id)?;

        for (name, value) in [
            ("adjusted_hours", cmd.adjusted_hours),
            ("adjusted_rate", cmd.adjusted_rate),
            ("adjusted_amount", cmd.adjusted_amount),
        ] {
            if let Some(value) = value {
                ensure_billed_number(name, value)?;
            }
        }

        let hours = cmd.adjusted_hours.unwrap_or(item.hours);
        let rate = cmd.adjusted_rate.unwrap_or(item.rate);
        let adjusted_amount = match cmd.adjusted_amount {
            Some(amount) => amount,
            None => round2(hours * rate),
        };

        Ok(vec![InvoiceEvent::LineItemAdjusted(LineItemAdjusted {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            line_item_id: cmd.line_item_id,
            adjusted_hours: cmd.adjusted_hours,
            adjusted_rate: cmd.adjusted_rate,
            adjusted_amount,
            reviewer_comment: cmd.reviewer_comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept_line(&self, cmd: &AcceptLineItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_reviewable(cmd.tenant_id, cmd.invoice_id)?;
        self.find_item(cmd.line_item_id)?;

        Ok(vec![InvoiceEvent::LineItemAccepted(LineItemAccepted {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            line_item_id: cmd.line_item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject_line(&self, cmd: &RejectLineItem) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_reviewable(cmd.tenant_id, cmd.invoice_id)?;
        self.find_item(cmd.line_item_id)?;

        Ok(vec![InvoiceEvent::LineItemRejected(LineItemRejected {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            line_item_id: cmd.line_item_id,
            reviewer_comment: cmd.reviewer_comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_reviewed(
        &self,
        cmd: &MarkLineItemsReviewed,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_reviewable(cmd.tenant_id, cmd.invoice_id)?;

        if cmd.line_item_ids.is_empty() {
            return Err(DomainError::validation("no line items selected"));
        }
        for id in &cmd.line_item_ids {
            self.find_item(*id)?;
        }

        Ok(vec![InvoiceEvent::LineItemsMarkedReviewed(
            LineItemsMarkedReviewed {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                line_item_ids: cmd.line_item_ids.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_findings(
        &self,
        cmd: &RecordComplianceFindings,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_reviewable(cmd.tenant_id, cmd.invoice_id)?;

        for finding in &cmd.findings {
            self.find_item(finding.line_item_id)?;
            ensure_billed_number("ai_score", finding.ai_score)?;

            if finding.action == AiAction::Adjust && finding.adjusted_amount.is_none() {
                return Err(DomainError::validation(
                    "adjust finding must carry an adjusted_amount",
                ));
            }
        }

        Ok(vec![InvoiceEvent::ComplianceFindingsRecorded(
            ComplianceFindingsRecorded {
                tenant_id: cmd.tenant_id,
                invoice_id: cmd.invoice_id,
                findings: cmd.findings.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.is_finalized() {
            return Err(DomainError::conflict("invoice is already finalized"));
        }

        Ok(vec![InvoiceEvent::InvoiceApproved(InvoiceApproved {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.is_finalized() {
            return Err(DomainError::conflict("invoice is already finalized"));
        }

        Ok(vec![InvoiceEvent::InvoiceRejected(InvoiceRejected {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn ensure_billed_number(name: &str, value: f64) -> Result<(), DomainError> {
    if !value.is_finite() {
        return Err(DomainError::validation(format!("{name} must be finite")));
    }
    if value < 0.0 {
        return Err(DomainError::validation(format!(
            "{name} must not be negative"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexbill_core::AggregateId;
    use lexbill_events::execute;

    use crate::line_item::Severity;
    use crate::sample;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn ingest_cmd(tenant_id: TenantId, invoice_id: InvoiceId, count: usize) -> IngestInvoice {
        let sample = sample::generate_sample_invoice(count, 42);
        IngestInvoice {
            tenant_id,
            invoice_id,
            vendor_id: sample.vendor_id,
            client_matter_id: sample.client_matter_id,
            invoice_number: sample.invoice_number,
            invoice_date: sample.invoice_date,
            format: sample.format,
            line_items: sample.line_items,
            occurred_at: test_time(),
        }
    }

    fn ingested(count: usize) -> (Invoice, TenantId, InvoiceId) {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = Invoice::empty(invoice_id);

        execute(
            &mut invoice,
            &InvoiceCommand::IngestInvoice(ingest_cmd(tenant_id, invoice_id, count)),
        )
        .unwrap();

        (invoice, tenant_id, invoice_id)
    }

    #[test]
    fn ingest_emits_invoice_ingested_with_totals() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = Invoice::empty(invoice_id);

        let cmd = ingest_cmd(tenant_id, invoice_id, 5);
        let expected_total = round2(cmd.line_items.iter().map(|l| l.amount).sum::<f64>());

        let events = invoice
            .handle(&InvoiceCommand::IngestInvoice(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            InvoiceEvent::InvoiceIngested(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.invoice_id, invoice_id);
                assert_eq!(e.vendor_id, "LAW001");
                assert_eq!(e.line_items.len(), 5);
                assert_eq!(e.total_original, expected_total);
            }
            _ => panic!("Expected InvoiceIngested event"),
        }
    }

    #[test]
    fn duplicate_ingest_is_a_conflict() {
        let (invoice, tenant_id, invoice_id) = ingested(3);

        let err = invoice
            .handle(&InvoiceCommand::IngestInvoice(ingest_cmd(
                tenant_id, invoice_id, 3,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn ingest_rejects_non_finite_numbers() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = Invoice::empty(invoice_id);

        let mut cmd = ingest_cmd(tenant_id, invoice_id, 3);
        cmd.line_items[1].hours = f64::NAN;

        let err = invoice
            .handle(&InvoiceCommand::IngestInvoice(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn adjust_computes_amount_from_adjusted_hours_and_rate() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line = invoice.line_items()[0].clone();

        execute(
            &mut invoice,
            &InvoiceCommand::AdjustLineItem(AdjustLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line.id,
                adjusted_hours: Some(2.0),
                adjusted_rate: None,
                adjusted_amount: None,
                reviewer_comment: Some("Reduced to reasonable time".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let adjusted = &invoice.line_items()[0];
        assert_eq!(adjusted.status, LineItemStatus::Adjusted);
        assert_eq!(adjusted.adjusted_amount, Some(round2(2.0 * line.rate)));
        assert_eq!(
            adjusted.reviewer_comment.as_deref(),
            Some("Reduced to reasonable time")
        );
    }

    #[test]
    fn explicit_adjusted_amount_wins() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line_id = invoice.line_items()[0].id;

        execute(
            &mut invoice,
            &InvoiceCommand::AdjustLineItem(AdjustLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line_id,
                adjusted_hours: Some(2.0),
                adjusted_rate: Some(300.0),
                adjusted_amount: Some(123.45),
                reviewer_comment: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(invoice.line_items()[0].adjusted_amount, Some(123.45));
    }

    #[test]
    fn rejected_line_contributes_zero_to_adjusted_total() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line = invoice.line_items()[0].clone();
        let before = invoice.totals();

        execute(
            &mut invoice,
            &InvoiceCommand::RejectLineItem(RejectLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line.id,
                reviewer_comment: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let after = invoice.totals();
        assert_eq!(after.total_original, before.total_original);
        assert_eq!(
            after.total_adjusted,
            round2(before.total_adjusted - line.amount)
        );
    }

    #[test]
    fn quick_accept_marks_line_approved_at_original_amount() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line_id = invoice.line_items()[1].id;
        let before = invoice.totals();

        execute(
            &mut invoice,
            &InvoiceCommand::AcceptLineItem(AcceptLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(invoice.line_items()[1].status, LineItemStatus::Approved);
        assert_eq!(invoice.totals(), before);
    }

    #[test]
    fn bulk_review_requires_a_selection() {
        let (invoice, tenant_id, invoice_id) = ingested(3);

        let err = invoice
            .handle(&InvoiceCommand::MarkLineItemsReviewed(
                MarkLineItemsReviewed {
                    tenant_id,
                    invoice_id,
                    line_item_ids: Vec::new(),
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn bulk_review_marks_selected_lines_reviewed() {
        let (mut invoice, tenant_id, invoice_id) = ingested(4);
        let ids: Vec<LineItemId> = invoice.line_items()[..2].iter().map(|l| l.id).collect();

        execute(
            &mut invoice,
            &InvoiceCommand::MarkLineItemsReviewed(MarkLineItemsReviewed {
                tenant_id,
                invoice_id,
                line_item_ids: ids,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(invoice.line_items()[0].status, LineItemStatus::Reviewed);
        assert_eq!(invoice.line_items()[1].status, LineItemStatus::Reviewed);
        assert_eq!(invoice.line_items()[2].status, LineItemStatus::Pending);
    }

    #[test]
    fn unknown_line_item_is_not_found() {
        let (invoice, tenant_id, invoice_id) = ingested(3);

        let err = invoice
            .handle(&InvoiceCommand::AcceptLineItem(AcceptLineItem {
                tenant_id,
                invoice_id,
                line_item_id: LineItemId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn compliance_findings_move_pending_invoice_to_reviewed() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let flagged = invoice.line_items()[0].clone();

        let finding = ComplianceFinding {
            line_item_id: flagged.id,
            ai_score: 55.21,
            action: AiAction::Adjust,
            adjusted_hours: Some(round2(flagged.hours * 0.8)),
            adjusted_rate: Some(flagged.rate),
            adjusted_amount: Some(round2(flagged.hours * 0.8 * flagged.rate)),
            issues: vec![ComplianceIssue {
                rule_id: "RATE-001".to_string(),
                rule_name: "Rate Compliance".to_string(),
                description: "Billed rate exceeds the agreed rate card".to_string(),
                severity: Severity::Medium,
            }],
        };

        execute(
            &mut invoice,
            &InvoiceCommand::RecordComplianceFindings(RecordComplianceFindings {
                tenant_id,
                invoice_id,
                findings: vec![finding.clone()],
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(invoice.status(), InvoiceStatus::Reviewed);
        let item = &invoice.line_items()[0];
        assert_eq!(item.status, LineItemStatus::Adjusted);
        assert_eq!(item.ai_score, Some(55.21));
        assert_eq!(item.ai_action, Some(AiAction::Adjust));
        assert_eq!(item.adjusted_amount, finding.adjusted_amount);
    }

    #[test]
    fn adjust_finding_without_amount_is_rejected() {
        let (invoice, tenant_id, invoice_id) = ingested(3);
        let line_id = invoice.line_items()[0].id;

        let err = invoice
            .handle(&InvoiceCommand::RecordComplianceFindings(
                RecordComplianceFindings {
                    tenant_id,
                    invoice_id,
                    findings: vec![ComplianceFinding {
                        line_item_id: line_id,
                        ai_score: 60.0,
                        action: AiAction::Adjust,
                        adjusted_hours: None,
                        adjusted_rate: None,
                        adjusted_amount: None,
                        issues: Vec::new(),
                    }],
                    occurred_at: test_time(),
                },
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn finalized_invoice_rejects_line_edits() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line_id = invoice.line_items()[0].id;

        execute(
            &mut invoice,
            &InvoiceCommand::ApproveInvoice(ApproveInvoice {
                tenant_id,
                invoice_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Approved);

        let err = invoice
            .handle(&InvoiceCommand::AdjustLineItem(AdjustLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line_id,
                adjusted_hours: Some(1.0),
                adjusted_rate: None,
                adjusted_amount: None,
                reviewer_comment: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn double_finalization_is_a_conflict() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);

        execute(
            &mut invoice,
            &InvoiceCommand::RejectInvoice(RejectInvoice {
                tenant_id,
                invoice_id,
                reason: Some("Excessive block billing".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = invoice
            .handle(&InvoiceCommand::ApproveInvoice(ApproveInvoice {
                tenant_id,
                invoice_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn adjusting_a_rejected_item_reenters_adjusted() {
        let (mut invoice, tenant_id, invoice_id) = ingested(3);
        let line = invoice.line_items()[0].clone();

        execute(
            &mut invoice,
            &InvoiceCommand::RejectLineItem(RejectLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line.id,
                reviewer_comment: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(invoice.line_items()[0].status, LineItemStatus::Rejected);

        execute(
            &mut invoice,
            &InvoiceCommand::AdjustLineItem(AdjustLineItem {
                tenant_id,
                invoice_id,
                line_item_id: line.id,
                adjusted_hours: None,
                adjusted_rate: None,
                adjusted_amount: Some(50.0),
                reviewer_comment: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let item = &invoice.line_items()[0];
        assert_eq!(item.status, LineItemStatus::Adjusted);
        assert_eq!(item.adjusted_amount, Some(50.0));
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lexbill_core::TenantId;

use crate::job::ComplianceJob;
use crate::result::{
    ComplianceError, ComplianceIssue, ComplianceReport, ComplianceResult, RecommendedAction,
    Severity,
};
use crate::snapshot::InvoiceSnapshot;

/// Seeded compliance review over an invoice snapshot.
///
/// Model (deliberately simple, a stand-in for a real rules engine):
/// - Every 10th line item by position is flagged for review.
/// - A uniform draw `u ∈ [0, 1)` decides the verdict: below 0.4 approve,
///   below 0.8 adjust, otherwise reject. The score is `u × 100`, two decimals.
/// - An adjustment shrinks the billed hours by a factor in `[0.7, 0.9)` and
///   recomputes the amount at the original rate.
///
/// The pass is pure given its seed, so reports are reproducible.
#[derive(Debug, Clone)]
pub struct InvoiceReviewJob {
    tenant_id: TenantId,
    input: InvoiceSnapshot,
    seed: u64,
}

impl InvoiceReviewJob {
    pub fn new(tenant_id: TenantId, input: InvoiceSnapshot, seed: u64) -> Self {
        Self {
            tenant_id,
            input,
            seed,
        }
    }
}

impl ComplianceJob for InvoiceReviewJob {
    type Input = InvoiceSnapshot;

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn input(&self) -> &Self::Input {
        &self.input
    }

    fn run(&self) -> Result<ComplianceReport, ComplianceError> {
        if self.input.tenant_id != self.tenant_id {
            return Err(ComplianceError::InvalidInput(
                "tenant_id mismatch between job and snapshot".to_string(),
            ));
        }

        for item in &self.input.line_items {
            if !(item.hours.is_finite() && item.rate.is_finite() && item.amount.is_finite()) {
                return Err(ComplianceError::InvalidInput(format!(
                    "line item {} has non-finite billed numbers",
                    item.line_item_id
                )));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut results = Vec::new();

        for (index, item) in self.input.line_items.iter().enumerate() {
            // Positional flagging, not random selection.
            if index % 10 != 0 {
                continue;
            }

            let u: f64 = rng.r#gen();
            let action = if u < 0.4 {
                RecommendedAction::Approve
            } else if u < 0.8 {
                RecommendedAction::Adjust
            } else {
                RecommendedAction::Reject
            };

            let (adjusted_hours, adjusted_rate, adjusted_amount) =
                if action == RecommendedAction::Adjust {
                    let factor: f64 = rng.gen_range(0.7..0.9);
                    let hours = round2(item.hours * factor);
                    (Some(hours), Some(item.rate), Some(round2(hours * item.rate)))
                } else {
                    (None, None, None)
                };

            results.push(ComplianceResult {
                line_item_id: item.line_item_id.clone(),
                ai_score: round2(u * 100.0),
                action,
                adjusted_hours,
                adjusted_rate,
                adjusted_amount,
                issues: issues_for(action, item.hours),
            });
        }

        Ok(ComplianceReport {
            invoice_id: self.input.invoice_id.clone(),
            inspected_count: self.input.line_items.len(),
            results,
            seed: self.seed,
        })
    }
}

fn issues_for(action: RecommendedAction, hours: f64) -> Vec<ComplianceIssue> {
    let mut issues = Vec::new();

    if action == RecommendedAction::Adjust {
        issues.push(ComplianceIssue {
            rule_id: "RATE-001".to_string(),
            rule_name: "Billing Rate Compliance".to_string(),
            description: "Hourly rate exceeds agreed rate for this timekeeper classification"
                .to_string(),
            severity: Severity::Medium,
        });
    }

    if action == RecommendedAction::Reject {
        issues.push(ComplianceIssue {
            rule_id: "NARR-002".to_string(),
            rule_name: "Narrative Detail Check".to_string(),
            description: "Narrative lacks sufficient detail to justify time spent".to_string(),
            severity: Severity::High,
        });
    }

    if hours > 7.0 {
        issues.push(ComplianceIssue {
            rule_id: "TIME-001".to_string(),
            rule_name: "Block Billing Check".to_string(),
            description: "Time entry exceeds 7 hours, suggesting potential block billing"
                .to_string(),
            severity: Severity::Medium,
        });
    }

    issues
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! Seeded sample invoice generation.
//!
//! Real LEDES parsing is out of scope for this service: uploads are validated
//! by file name only and answered with a generated dataset of realistic legal
//! billing lines. Generation is seeded so callers and tests can reproduce a
//! dataset exactly.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::line_item::{LedesFormat, LineItem, LineItemId, LineItemStatus};

pub const DEFAULT_LINE_COUNT: usize = 347;

/// Upper bound on requested line counts. Generation allocates the full
/// dataset up front, so callers must reject counts above this before
/// invoking the generator.
pub const MAX_LINE_COUNT: usize = 10_000;

const TASK_CODES: &[&str] = &[
    "A101", "A102", "A103", "A104", "B110", "B120", "B130", "L100", "L110", "L120",
];

const ACTIVITY_CODES: &[&str] = &[
    "T01", "T02", "T03", "T04", "T05", "T06", "T07", "T08", "T09", "T10",
];

const TIMEKEEPER_NAMES: &[&str] = &[
    "John Smith",
    "Jane Doe",
    "Robert Johnson",
    "Emily Brown",
    "Michael Davis",
    "Sarah Miller",
    "David Wilson",
    "Jennifer Moore",
];

const TIMEKEEPER_CLASSIFICATIONS: &[&str] = &["P", "A", "C", "PL"];

const NARRATIVES: &[&str] = &[
    "Review and analyze documents related to case strategy",
    "Prepare and draft motion for summary judgment",
    "Conference call with client regarding case developments",
    "Research legal precedent for upcoming hearing",
    "Attend deposition of opposing party witness",
    "Draft and revise settlement agreement terms",
    "Review and analyze discovery responses",
    "Prepare for and attend client meeting",
    "Draft and revise complaint",
    "Review court filings and prepare response strategy",
];

/// Header + lines a parse of the uploaded file would have produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInvoice {
    pub vendor_id: String,
    pub client_matter_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub format: LedesFormat,
    pub line_items: Vec<LineItem>,
}

/// Generate a sample invoice with `line_count` billing lines.
pub fn generate_sample_invoice(line_count: usize, seed: u64) -> SampleInvoice {
    let mut rng = StdRng::seed_from_u64(seed);

    SampleInvoice {
        vendor_id: "LAW001".to_string(),
        client_matter_id: "CLIENT001-M47".to_string(),
        invoice_number: "INV-2023-0123".to_string(),
        invoice_date: ymd(2023, 5, 15),
        format: LedesFormat::Ledes1998B,
        line_items: generate_line_items(line_count, &mut rng),
    }
}

/// Generate `count` pending line items with billed numbers in realistic ranges.
pub fn generate_line_items(count: usize, rng: &mut StdRng) -> Vec<LineItem> {
    let service_window_start = ymd(2023, 1, 1);
    // 2023-01-01 through 2023-05-31 inclusive.
    let service_window_days = 151;

    (0..count)
        .map(|i| {
            let hours = crate::round2(rng.gen_range(0.5..8.5));
            let rate = rng.gen_range(200..700) as f64;
            let amount = crate::round2(hours * rate);

            LineItem {
                id: LineItemId::new(),
                ledes_row_num: (i + 1) as u32,
                task_code: pick(rng, TASK_CODES),
                activity_code: pick(rng, ACTIVITY_CODES),
                expense_code: None,
                hours,
                rate,
                amount,
                narrative: pick(rng, NARRATIVES),
                tax: 0.0,
                status: LineItemStatus::Pending,
                ai_score: None,
                ai_action: None,
                adjusted_hours: None,
                adjusted_rate: None,
                adjusted_amount: None,
                reviewer_comment: None,
                timekeeper_id: format!("TK-{}", rng.gen_range(1..=100)),
                timekeeper_name: pick(rng, TIMEKEEPER_NAMES),
                timekeeper_classification: pick(rng, TIMEKEEPER_CLASSIFICATIONS),
                service_date: service_window_start
                    + Duration::days(rng.gen_range(0..service_window_days)),
            }
        })
        .collect()
}

fn pick(rng: &mut StdRng, pool: &[&str]) -> String {
    pool[rng.gen_range(0..pool.len())].to_string()
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    // Only called with literal, in-range dates.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

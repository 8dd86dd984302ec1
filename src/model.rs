use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single clean order line, tagged with its source period.
///
/// `amount_cents = None` means the amount was unparsable and the configured
/// policy is `propagate_null`: the row still counts for order/customer
/// cardinalities and purchase dates, but contributes nothing to any sum.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub customer_id: String,
    pub order_id: String,
    pub channel: String,
    pub site: String,
    pub document_type: String,
    pub item_status: String,
    pub amount_cents: Option<i64>,
    pub created_at: NaiveDateTime,
    pub quantity: u32,
    pub period_label: String,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    pub ltv_total_cents: i64,
    pub order_count: usize,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
    /// Band label assigned by the distribution analyzer ("vip", "p50_p75", ...).
    pub value_segment: String,
    pub frequency_segment: FrequencySegment,
    pub lifecycle_status: LifecycleStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodAggregate {
    pub period_label: String,
    pub revenue_cents: i64,
    pub unique_customers: usize,
    pub unique_orders: usize,
    /// `None` when the period has no orders to divide by.
    pub avg_ticket_cents: Option<f64>,
}

/// Revenue/order split by order type (total quantity vs the bulk threshold).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderTypeSplit {
    pub bulk_revenue_cents: i64,
    pub retail_revenue_cents: i64,
    pub bulk_orders: usize,
    pub retail_orders: usize,
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationPoint {
    pub customer_rank_percentile: f64,
    pub cumulative_revenue_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationSummary {
    /// One point per customer, descending `ltv_total_cents`. Empty when
    /// total revenue is zero (the curve is undefined, not divided by zero).
    pub points: Vec<ConcentrationPoint>,
    /// Smallest rank percentile whose cumulative revenue reaches 80%.
    pub pareto_rank_percentile: Option<f64>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Active,
    AtRisk,
    Dormant,
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::AtRisk => write!(f, "at_risk"),
            Self::Dormant => write!(f, "dormant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencySegment {
    New,
    Recurrent,
    Loyal,
}

impl std::fmt::Display for FrequencySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Recurrent => write!(f, "recurrent"),
            Self::Loyal => write!(f, "loyal"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetentionSummary {
    pub earlier_period: String,
    pub later_period: String,
    pub earlier_customers: usize,
    pub later_customers: usize,
    pub retained_customers: usize,
    /// |C1 ∩ C2| / |C1| * 100; 0.0 when the earlier cohort is empty.
    pub retention_rate_pct: f64,
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SkipReason {
    SourceMissing,
    SchemaMismatch(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedPeriod {
    pub period_label: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DroppedRowCounts {
    pub filtered: usize,
    pub invalid_amount: usize,
    pub invalid_date: usize,
}

/// Row/batch-level recoveries, reported alongside the payload rather than
/// swallowed. Keyed maps are BTreeMaps so serialization is reproducible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunDiagnostics {
    pub skipped_periods: Vec<SkippedPeriod>,
    pub dropped_rows: BTreeMap<String, DroppedRowCounts>,
}

// ---------------------------------------------------------------------------
// Report payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentCounts {
    pub value: BTreeMap<String, usize>,
    pub frequency: BTreeMap<String, usize>,
    pub lifecycle: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub config_name: String,
    pub engine_version: String,
    /// Recency clock for the whole run. Injected, never read from a system
    /// clock, so identical inputs always produce identical payloads.
    pub reference_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct LtvReport {
    pub meta: ReportMeta,
    pub periods: Vec<PeriodAggregate>,
    /// All customers, descending `ltv_total_cents`, ties by ascending id.
    pub customers: Vec<CustomerAggregate>,
    pub top_customers: Vec<CustomerAggregate>,
    pub concentration: ConcentrationSummary,
    pub segments: SegmentCounts,
    pub order_split: OrderTypeSplit,
    pub retention: Option<RetentionSummary>,
    pub diagnostics: RunDiagnostics,
}

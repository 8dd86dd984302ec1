use chrono::NaiveDate;

use crate::model::{
    ConcentrationSummary, CustomerAggregate, LtvReport, OrderTypeSplit, PeriodAggregate,
    ReportMeta, RetentionSummary, RunDiagnostics, SegmentCounts,
};

/// Merge every computed dimension into the final immutable payload.
///
/// `customers` must already be ranked and classified. Nothing here reads a
/// clock or generates identifiers: identical inputs serialize identically.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    config_name: &str,
    reference_date: NaiveDate,
    periods: Vec<PeriodAggregate>,
    customers: Vec<CustomerAggregate>,
    concentration: ConcentrationSummary,
    order_split: OrderTypeSplit,
    retention: Option<RetentionSummary>,
    diagnostics: RunDiagnostics,
    top_n: usize,
) -> LtvReport {
    let top_customers: Vec<CustomerAggregate> =
        customers.iter().take(top_n).cloned().collect();

    LtvReport {
        meta: ReportMeta {
            config_name: config_name.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            reference_date,
        },
        periods,
        top_customers,
        concentration,
        segments: segment_counts(&customers),
        order_split,
        retention,
        diagnostics,
        customers,
    }
}

fn segment_counts(customers: &[CustomerAggregate]) -> SegmentCounts {
    let mut counts = SegmentCounts::default();
    for customer in customers {
        *counts
            .value
            .entry(customer.value_segment.clone())
            .or_insert(0) += 1;
        *counts
            .frequency
            .entry(customer.frequency_segment.to_string())
            .or_insert(0) += 1;
        *counts
            .lifecycle
            .entry(customer.lifecycle_status.to_string())
            .or_insert(0) += 1;
    }
    counts
}

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aggregate::{aggregate_customers, aggregate_periods, split_by_order_type};
use crate::config::LtvConfig;
use crate::distribution::{assign_value_segments, concentration_curve, rank_customers};
use crate::error::LtvError;
use crate::ingest::{normalize_batch, RawBatch};
use crate::lifecycle::{classify_frequency, classify_lifecycle, retention_rate};
use crate::model::{LtvReport, OrderLine, RunDiagnostics, SkipReason, SkippedPeriod};
use crate::report::assemble;

/// Pre-loaded raw batches keyed by period label. Loading files is the
/// caller's concern; the engine only ever sees in-memory records.
pub struct LtvInput {
    pub batches: BTreeMap<String, RawBatch>,
}

/// Run the full analysis per config. Period batches are ingested in the
/// configured (ascending) period order so the merged dataset is
/// deterministic; missing or schema-broken batches are skipped and
/// reported, never fatal. Only a fully empty clean dataset aborts the run.
pub fn run(config: &LtvConfig, input: &LtvInput) -> Result<LtvReport, LtvError> {
    let mut clean: Vec<OrderLine> = Vec::new();
    let mut diagnostics = RunDiagnostics::default();

    for period in &config.periods {
        let Some(batch) = input.batches.get(period) else {
            diagnostics.skipped_periods.push(SkippedPeriod {
                period_label: period.clone(),
                reason: SkipReason::SourceMissing,
            });
            continue;
        };

        match normalize_batch(batch, config) {
            Ok((lines, dropped)) => {
                diagnostics.dropped_rows.insert(period.clone(), dropped);
                clean.extend(lines);
            }
            Err(LtvError::SchemaMismatch { field, .. }) => {
                diagnostics.skipped_periods.push(SkippedPeriod {
                    period_label: period.clone(),
                    reason: SkipReason::SchemaMismatch(field),
                });
            }
            Err(other) => return Err(other),
        }
    }

    if clean.is_empty() {
        return Err(LtvError::EmptyDataset);
    }

    let reference_date = max_purchase_date(&clean);

    let mut customers = aggregate_customers(&clean);
    rank_customers(&mut customers);

    // Distribution and lifecycle classification are independent of each
    // other; both only read the aggregates.
    assign_value_segments(&mut customers, config);
    classify_lifecycle(&mut customers, reference_date, &config.recency);
    classify_frequency(&mut customers, &config.frequency);

    let periods = aggregate_periods(&clean, &config.periods);
    let order_split = split_by_order_type(&clean, config.bulk_quantity_threshold);
    let concentration = concentration_curve(&customers);
    let retention = config
        .retention
        .as_ref()
        .map(|pair| retention_rate(&clean, &pair.earlier, &pair.later));

    Ok(assemble(
        &config.name,
        reference_date,
        periods,
        customers,
        concentration,
        order_split,
        retention,
        diagnostics,
        config.top_n,
    ))
}

/// The recency clock: latest purchase seen anywhere in the clean dataset.
/// Derived from the data, never from the wall clock.
fn max_purchase_date(lines: &[OrderLine]) -> NaiveDate {
    lines
        .iter()
        .map(|l| l.created_at.date())
        .max()
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}

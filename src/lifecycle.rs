use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::{FrequencyThresholds, RecencyThresholds};
use crate::model::{
    CustomerAggregate, FrequencySegment, LifecycleStatus, OrderLine, RetentionSummary,
};

/// Classify recency against an injected reference date. The reference date
/// is always supplied by the caller (typically the dataset's max purchase
/// date); this module never consults a system clock.
pub fn classify_lifecycle(
    customers: &mut [CustomerAggregate],
    reference_date: NaiveDate,
    thresholds: &RecencyThresholds,
) {
    for customer in customers.iter_mut() {
        let days_since = (reference_date - customer.last_purchase.date()).num_days();
        customer.lifecycle_status = if days_since < thresholds.active_within_days {
            LifecycleStatus::Active
        } else if days_since < thresholds.dormant_after_days {
            LifecycleStatus::AtRisk
        } else {
            LifecycleStatus::Dormant
        };
    }
}

/// Segment customers by distinct order count. Loyal wins over Recurrent.
pub fn classify_frequency(customers: &mut [CustomerAggregate], thresholds: &FrequencyThresholds) {
    for customer in customers.iter_mut() {
        customer.frequency_segment = if customer.order_count >= thresholds.loyal_min {
            FrequencySegment::Loyal
        } else if customer.order_count >= thresholds.recurrent_min {
            FrequencySegment::Recurrent
        } else {
            FrequencySegment::New
        };
    }
}

/// Retention between two cohort periods: the share of the earlier cohort's
/// customers that reappear in the later one. Pure set computation over the
/// clean lines; line order is irrelevant.
pub fn retention_rate(lines: &[OrderLine], earlier: &str, later: &str) -> RetentionSummary {
    let cohort = |period: &str| -> BTreeSet<&str> {
        lines
            .iter()
            .filter(|l| l.period_label == period)
            .map(|l| l.customer_id.as_str())
            .collect()
    };

    let c1 = cohort(earlier);
    let c2 = cohort(later);
    let retained = c1.intersection(&c2).count();
    let rate = if c1.is_empty() {
        0.0
    } else {
        retained as f64 / c1.len() as f64 * 100.0
    };

    RetentionSummary {
        earlier_period: earlier.to_string(),
        later_period: later.to_string(),
        earlier_customers: c1.len(),
        later_customers: c2.len(),
        retained_customers: retained,
        retention_rate_pct: rate,
    }
}

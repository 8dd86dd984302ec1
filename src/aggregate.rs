use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

use crate::model::{
    CustomerAggregate, FrequencySegment, LifecycleStatus, OrderLine, OrderTypeSplit,
    PeriodAggregate,
};

/// Roll up clean lines per customer. Null amounts (propagated by policy)
/// still count for order cardinality and purchase dates, but not for sums.
///
/// Segments and lifecycle status are placeholders here; the distribution
/// analyzer and lifecycle classifier overwrite them downstream.
pub fn aggregate_customers(lines: &[OrderLine]) -> Vec<CustomerAggregate> {
    struct Acc {
        ltv_cents: i64,
        orders: BTreeSet<String>,
        first: NaiveDateTime,
        last: NaiveDateTime,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();

    for line in lines {
        let entry = groups.entry(&line.customer_id).or_insert_with(|| Acc {
            ltv_cents: 0,
            orders: BTreeSet::new(),
            first: line.created_at,
            last: line.created_at,
        });
        entry.ltv_cents += line.amount_cents.unwrap_or(0);
        entry.orders.insert(line.order_id.clone());
        if line.created_at < entry.first {
            entry.first = line.created_at;
        }
        if line.created_at > entry.last {
            entry.last = line.created_at;
        }
    }

    groups
        .into_iter()
        .map(|(customer_id, acc)| CustomerAggregate {
            customer_id: customer_id.to_string(),
            ltv_total_cents: acc.ltv_cents,
            order_count: acc.orders.len(),
            first_purchase: acc.first,
            last_purchase: acc.last,
            value_segment: String::new(),
            frequency_segment: FrequencySegment::New,
            lifecycle_status: LifecycleStatus::Active,
        })
        .collect()
}

/// Roll up clean lines per period, in the configured period order.
/// Periods with no surviving rows are absent from the output.
pub fn aggregate_periods(lines: &[OrderLine], period_order: &[String]) -> Vec<PeriodAggregate> {
    struct Acc {
        revenue_cents: i64,
        customers: BTreeSet<String>,
        orders: BTreeSet<String>,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();

    for line in lines {
        let entry = groups.entry(&line.period_label).or_insert_with(|| Acc {
            revenue_cents: 0,
            customers: BTreeSet::new(),
            orders: BTreeSet::new(),
        });
        entry.revenue_cents += line.amount_cents.unwrap_or(0);
        entry.customers.insert(line.customer_id.clone());
        entry.orders.insert(line.order_id.clone());
    }

    period_order
        .iter()
        .filter_map(|label| {
            groups.get(label.as_str()).map(|acc| PeriodAggregate {
                period_label: label.clone(),
                revenue_cents: acc.revenue_cents,
                unique_customers: acc.customers.len(),
                unique_orders: acc.orders.len(),
                avg_ticket_cents: if acc.orders.is_empty() {
                    None
                } else {
                    Some(acc.revenue_cents as f64 / acc.orders.len() as f64)
                },
            })
        })
        .collect()
}

/// Classify whole orders as bulk or retail by total quantity, then attribute
/// each line's revenue to its order's side.
pub fn split_by_order_type(lines: &[OrderLine], bulk_quantity_threshold: u32) -> OrderTypeSplit {
    let mut order_quantities: BTreeMap<&str, u64> = BTreeMap::new();
    for line in lines {
        *order_quantities.entry(&line.order_id).or_insert(0) += u64::from(line.quantity);
    }

    let is_bulk =
        |order_id: &str| order_quantities[order_id] > u64::from(bulk_quantity_threshold);

    let mut split = OrderTypeSplit::default();
    for (order_id, _) in &order_quantities {
        if is_bulk(order_id) {
            split.bulk_orders += 1;
        } else {
            split.retail_orders += 1;
        }
    }
    for line in lines {
        let cents = line.amount_cents.unwrap_or(0);
        if is_bulk(&line.order_id) {
            split.bulk_revenue_cents += cents;
        } else {
            split.retail_revenue_cents += cents;
        }
    }
    split
}

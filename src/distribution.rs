use crate::config::LtvConfig;
use crate::model::{ConcentrationPoint, ConcentrationSummary, CustomerAggregate};

/// Cumulative revenue share that defines the Pareto summary metric.
const PARETO_THRESHOLD_PCT: f64 = 80.0;

/// Sort customers by descending LTV. Ties break by ascending customer id so
/// the ordering is reproducible across runs and platforms.
pub fn rank_customers(customers: &mut [CustomerAggregate]) {
    customers.sort_by(|a, b| {
        b.ltv_total_cents
            .cmp(&a.ltv_total_cents)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
}

/// Build the revenue-concentration curve over ranked customers.
///
/// Expects the slice to be ranked already (`rank_customers`). When total
/// revenue is zero the curve is undefined; an empty summary is returned
/// instead of dividing by zero.
pub fn concentration_curve(ranked: &[CustomerAggregate]) -> ConcentrationSummary {
    let total_cents: i64 = ranked.iter().map(|c| c.ltv_total_cents).sum();
    if ranked.is_empty() || total_cents <= 0 {
        return ConcentrationSummary {
            points: Vec::new(),
            pareto_rank_percentile: None,
        };
    }

    let n = ranked.len() as f64;
    let mut points = Vec::with_capacity(ranked.len());
    let mut pareto_rank_percentile = None;
    let mut running_cents: i64 = 0;

    for (i, customer) in ranked.iter().enumerate() {
        running_cents += customer.ltv_total_cents;
        let rank_pct = (i + 1) as f64 / n * 100.0;
        let cumulative_pct = running_cents as f64 / total_cents as f64 * 100.0;
        if pareto_rank_percentile.is_none() && cumulative_pct >= PARETO_THRESHOLD_PCT {
            pareto_rank_percentile = Some(rank_pct);
        }
        points.push(ConcentrationPoint {
            customer_rank_percentile: rank_pct,
            cumulative_revenue_percentage: cumulative_pct,
        });
    }

    ConcentrationSummary {
        points,
        pareto_rank_percentile,
    }
}

/// Tag every customer with a percentile band label over `ltv_total_cents`.
///
/// Customers at or above the VIP percentile value get `vip`; the rest fall
/// into bands between the configured thresholds, e.g. with the default
/// [25, 50, 75, 90] list: `below_p25`, `p25_p50`, `p50_p75`, `p75_p90`,
/// `p90_p99`.
pub fn assign_value_segments(customers: &mut [CustomerAggregate], config: &LtvConfig) {
    if customers.is_empty() {
        return;
    }

    let mut sorted: Vec<i64> = customers.iter().map(|c| c.ltv_total_cents).collect();
    sorted.sort_unstable();

    let vip_value = percentile(&sorted, config.vip_percentile);
    let thresholds: Vec<(f64, f64)> = config
        .value_percentiles
        .iter()
        .map(|&p| (p, percentile(&sorted, p)))
        .collect();

    for customer in customers.iter_mut() {
        let ltv = customer.ltv_total_cents as f64;
        customer.value_segment = if ltv >= vip_value {
            "vip".to_string()
        } else {
            band_label(ltv, &thresholds, config.vip_percentile)
        };
    }
}

fn band_label(ltv: f64, thresholds: &[(f64, f64)], vip_percentile: f64) -> String {
    // Highest threshold the customer clears determines the band floor.
    let mut floor: Option<usize> = None;
    for (i, &(_, value)) in thresholds.iter().enumerate() {
        if ltv >= value {
            floor = Some(i);
        }
    }

    match floor {
        None => match thresholds.first() {
            Some(&(p, _)) => format!("below_p{p}"),
            None => format!("below_p{vip_percentile}"),
        },
        Some(i) => {
            let lower = thresholds[i].0;
            let upper = thresholds
                .get(i + 1)
                .map(|&(p, _)| p)
                .unwrap_or(vip_percentile);
            format!("p{lower}_p{upper}")
        }
    }
}

/// Linear-interpolation percentile over ascending values.
fn percentile(sorted_asc: &[i64], p: f64) -> f64 {
    debug_assert!(!sorted_asc.is_empty());
    if sorted_asc.len() == 1 {
        return sorted_asc[0] as f64;
    }
    let rank = p / 100.0 * (sorted_asc.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let lo_value = sorted_asc[lo] as f64;
    let hi_value = sorted_asc[hi.min(sorted_asc.len() - 1)] as f64;
    lo_value + (rank - lo as f64) * (hi_value - lo_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrequencySegment, LifecycleStatus};
    use chrono::NaiveDate;

    fn customer(id: &str, ltv_cents: i64) -> CustomerAggregate {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        CustomerAggregate {
            customer_id: id.into(),
            ltv_total_cents: ltv_cents,
            order_count: 1,
            first_purchase: date,
            last_purchase: date,
            value_segment: String::new(),
            frequency_segment: FrequencySegment::New,
            lifecycle_status: LifecycleStatus::Active,
        }
    }

    #[test]
    fn ranking_breaks_ties_by_id() {
        let mut customers = vec![
            customer("c_b", 5000),
            customer("c_a", 5000),
            customer("c_z", 9000),
        ];
        rank_customers(&mut customers);
        let ids: Vec<&str> = customers.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, ["c_z", "c_a", "c_b"]);
    }

    #[test]
    fn pareto_walkthrough() {
        // ltv = [100, 50, 10], total 160 → cumulative [62.5, 93.75, 100.0]
        let mut customers = vec![
            customer("c_1", 10000),
            customer("c_2", 5000),
            customer("c_3", 1000),
        ];
        rank_customers(&mut customers);
        let summary = concentration_curve(&customers);

        let cum: Vec<f64> = summary
            .points
            .iter()
            .map(|p| p.cumulative_revenue_percentage)
            .collect();
        assert_eq!(cum, [62.5, 93.75, 100.0]);

        let ranks: Vec<f64> = summary
            .points
            .iter()
            .map(|p| p.customer_rank_percentile)
            .collect();
        assert!((ranks[0] - 100.0 / 3.0).abs() < 1e-9);
        assert!((ranks[2] - 100.0).abs() < 1e-9);

        // 80% of revenue is reached at the 2nd customer → 2/3 * 100
        let pareto = summary.pareto_rank_percentile.unwrap();
        assert!((pareto - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn curve_is_nondecreasing_and_ends_at_100() {
        let mut customers = vec![
            customer("c_1", 700),
            customer("c_2", 1300),
            customer("c_3", 400),
            customer("c_4", 400),
            customer("c_5", 9200),
        ];
        rank_customers(&mut customers);
        let summary = concentration_curve(&customers);

        let mut prev = 0.0;
        for point in &summary.points {
            assert!(point.cumulative_revenue_percentage >= prev);
            prev = point.cumulative_revenue_percentage;
        }
        assert_eq!(prev, 100.0);
    }

    #[test]
    fn zero_revenue_gives_empty_curve() {
        let customers = vec![customer("c_1", 0), customer("c_2", 0)];
        let summary = concentration_curve(&customers);
        assert!(summary.points.is_empty());
        assert!(summary.pareto_rank_percentile.is_none());
    }

    #[test]
    fn empty_input_gives_empty_curve() {
        let summary = concentration_curve(&[]);
        assert!(summary.points.is_empty());
    }

    #[test]
    fn percentile_interpolates() {
        let values = vec![1000, 2000, 3000, 4000, 5000];
        assert_eq!(percentile(&values, 0.0), 1000.0);
        assert_eq!(percentile(&values, 50.0), 3000.0);
        assert_eq!(percentile(&values, 100.0), 5000.0);
        assert_eq!(percentile(&values, 25.0), 2000.0);
        // between ranks: 10% of (n-1)=4 → rank 0.4 → 1000 + 0.4*1000
        assert!((percentile(&values, 10.0) - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn vip_and_band_assignment() {
        // 100 customers, ltv 1..=100 (in cents ×100)
        let mut customers: Vec<CustomerAggregate> = (1..=100)
            .map(|i| customer(&format!("c_{i:03}"), i * 100))
            .collect();
        let config = LtvConfig::from_toml("name = \"t\"\nperiods = [\"2024\"]\n").unwrap();
        assign_value_segments(&mut customers, &config);

        // p99 over 1..=100 (linear) = 99.01 → only the 100-unit customer is VIP
        let vips: Vec<&str> = customers
            .iter()
            .filter(|c| c.value_segment == "vip")
            .map(|c| c.customer_id.as_str())
            .collect();
        assert_eq!(vips, ["c_100"]);

        let seg = |id: &str| {
            customers
                .iter()
                .find(|c| c.customer_id == id)
                .unwrap()
                .value_segment
                .clone()
        };
        assert_eq!(seg("c_001"), "below_p25");
        assert_eq!(seg("c_050"), "p25_p50");
        assert_eq!(seg("c_070"), "p50_p75");
        assert_eq!(seg("c_080"), "p75_p90");
        assert_eq!(seg("c_095"), "p90_p99");
    }

    #[test]
    fn single_customer_is_vip() {
        let mut customers = vec![customer("c_1", 5000)];
        let config = LtvConfig::from_toml("name = \"t\"\nperiods = [\"2024\"]\n").unwrap();
        assign_value_segments(&mut customers, &config);
        assert_eq!(customers[0].value_segment, "vip");
    }
}

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{InvalidAmountPolicy, LtvConfig};
use crate::error::LtvError;
use crate::model::{DroppedRowCounts, OrderLine};

/// Fields every raw record must expose. Checked once per batch; a missing
/// field fails the whole batch as `SchemaMismatch`.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "channel",
    "site",
    "document_type",
    "customer_id",
    "item_status",
    "total_amount",
    "created_at",
    "order_id",
    "quantity",
];

/// One period's raw extract: string-keyed records straight from the source.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub period_label: String,
    pub records: Vec<BTreeMap<String, String>>,
}

/// Validate, filter, and clean one period's batch into `OrderLine`s.
///
/// Row-level problems are recovered per policy and counted; only a schema
/// violation rejects the batch.
pub fn normalize_batch(
    batch: &RawBatch,
    config: &LtvConfig,
) -> Result<(Vec<OrderLine>, DroppedRowCounts), LtvError> {
    check_schema(batch, config)?;

    let mut lines = Vec::new();
    let mut dropped = DroppedRowCounts::default();

    'rows: for record in &batch.records {
        for rule in &config.filters {
            // check_schema guarantees the field exists
            let value = record.get(&rule.field).map(String::as_str).unwrap_or("");
            if !rule.accepts(value) {
                dropped.filtered += 1;
                continue 'rows;
            }
        }

        let field = |name: &str| record.get(name).map(String::as_str).unwrap_or("");

        let amount_cents = match parse_amount_cents(field("total_amount")) {
            Some(cents) => Some(cents),
            None => match config.invalid_amount {
                InvalidAmountPolicy::DropRow => {
                    dropped.invalid_amount += 1;
                    continue;
                }
                InvalidAmountPolicy::CoerceZero => Some(0),
                InvalidAmountPolicy::PropagateNull => None,
            },
        };

        // Dates are never coerced: every downstream metric depends on ordering.
        let Some(mut created_at) = parse_created_at(field("created_at")) else {
            dropped.invalid_date += 1;
            continue;
        };
        if config.truncate_to_day {
            created_at = truncate_to_day(created_at);
        }

        lines.push(OrderLine {
            customer_id: field("customer_id").to_string(),
            order_id: field("order_id").to_string(),
            channel: field("channel").to_string(),
            site: field("site").to_string(),
            document_type: field("document_type").to_string(),
            item_status: field("item_status").to_string(),
            amount_cents,
            created_at,
            quantity: parse_quantity(field("quantity")),
            period_label: batch.period_label.clone(),
        });
    }

    Ok((lines, dropped))
}

fn check_schema(batch: &RawBatch, config: &LtvConfig) -> Result<(), LtvError> {
    let filter_fields = config.filters.iter().map(|r| r.field.as_str());
    let required: Vec<&str> = REQUIRED_FIELDS.iter().copied().chain(filter_fields).collect();

    for record in &batch.records {
        for field in &required {
            if !record.contains_key(*field) {
                return Err(LtvError::SchemaMismatch {
                    period: batch.period_label.clone(),
                    field: (*field).to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Parse a textual decimal into non-negative integer cents.
///
/// The decimal separator is ambiguous in the source extracts: a comma is
/// normalized to a dot before parsing. Negative, non-finite, and
/// non-numeric values are all invalid.
pub fn parse_amount_cents(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', ".");
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as i64)
}

/// Parse a timestamp, accepting datetime and date-only forms.
pub fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn truncate_to_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_hms_opt(0, 0, 0).unwrap_or(dt)
}

/// Quantity only drives order-type classification, never revenue, so it is
/// parsed leniently: anything unreadable counts as a single unit.
fn parse_quantity(raw: &str) -> u32 {
    raw.trim().parse().unwrap_or(1)
}

/// Build a `RawBatch` from in-memory CSV text. File reading stays with the
/// caller; this only decodes headers and rows.
pub fn load_csv_batch(period_label: &str, csv_data: &str) -> Result<RawBatch, LtvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LtvError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LtvError::Csv(e.to_string()))?;
        let mut fields = BTreeMap::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(i) {
                fields.insert(header.clone(), value.to_string());
            }
        }
        records.push(fields);
    }

    Ok(RawBatch {
        period_label: period_label.to_string(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_record(amount: &str, created_at: &str) -> BTreeMap<String, String> {
        record(&[
            ("channel", "Juntoz"),
            ("site", "Juntoz"),
            ("document_type", "DNI"),
            ("customer_id", "c_1"),
            ("item_status", "Received"),
            ("total_amount", amount),
            ("created_at", created_at),
            ("order_id", "o_1"),
            ("quantity", "1"),
        ])
    }

    fn config(extra: &str) -> LtvConfig {
        let toml = format!("name = \"t\"\nperiods = [\"2024\"]\n{extra}");
        LtvConfig::from_toml(&toml).unwrap()
    }

    #[test]
    fn amount_parses_both_separators() {
        assert_eq!(parse_amount_cents("10.50"), Some(1050));
        assert_eq!(parse_amount_cents("20,75"), Some(2075));
        assert_eq!(parse_amount_cents(" 100 "), Some(10000));
        assert_eq!(parse_amount_cents("-5.00"), None);
        assert_eq!(parse_amount_cents("abc"), None);
        assert_eq!(parse_amount_cents(""), None);
    }

    #[test]
    fn created_at_accepts_known_formats() {
        assert!(parse_created_at("2025-08-01 13:45:00").is_some());
        assert!(parse_created_at("2025-08-01T13:45:00").is_some());
        assert!(parse_created_at("2025-08-01").is_some());
        assert!(parse_created_at("01/08/2025").is_some());
        assert!(parse_created_at("next tuesday").is_none());
    }

    #[test]
    fn normalize_clean_rows() {
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.50", "2024-03-01"), full_record("20,75", "2024-04-01")],
        };
        let (lines, dropped) = normalize_batch(&batch, &config("")).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].amount_cents, Some(1050));
        assert_eq!(lines[1].amount_cents, Some(2075));
        assert_eq!(lines[0].period_label, "2024");
        assert_eq!(dropped, DroppedRowCounts::default());
    }

    #[test]
    fn missing_field_fails_batch() {
        let mut bad = full_record("10.00", "2024-03-01");
        bad.remove("order_id");
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.00", "2024-03-01"), bad],
        };
        let err = normalize_batch(&batch, &config("")).unwrap_err();
        match err {
            LtvError::SchemaMismatch { period, field } => {
                assert_eq!(period, "2024");
                assert_eq!(field, "order_id");
            }
            other => panic!("expected SchemaMismatch, got {other}"),
        }
    }

    #[test]
    fn missing_filter_field_fails_batch() {
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.00", "2024-03-01")],
        };
        let cfg = config("[[filters]]\nfield = \"warehouse\"\nequals = \"Lima\"\n");
        let err = normalize_batch(&batch, &cfg).unwrap_err();
        assert!(matches!(err, LtvError::SchemaMismatch { ref field, .. } if field == "warehouse"));
    }

    #[test]
    fn filters_drop_and_count() {
        let mut other_channel = full_record("10.00", "2024-03-01");
        other_channel.insert("channel".into(), "Ripley".into());
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.00", "2024-03-01"), other_channel],
        };
        let cfg = config("[[filters]]\nfield = \"channel\"\nequals = \"Juntoz\"\n");
        let (lines, dropped) = normalize_batch(&batch, &cfg).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(dropped.filtered, 1);
    }

    #[test]
    fn invalid_amount_policies() {
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("n/a", "2024-03-01")],
        };

        let (lines, dropped) = normalize_batch(&batch, &config("")).unwrap();
        assert!(lines.is_empty());
        assert_eq!(dropped.invalid_amount, 1);

        let (lines, _) =
            normalize_batch(&batch, &config("invalid_amount = \"coerce_zero\"\n")).unwrap();
        assert_eq!(lines[0].amount_cents, Some(0));

        let (lines, _) =
            normalize_batch(&batch, &config("invalid_amount = \"propagate_null\"\n")).unwrap();
        assert_eq!(lines[0].amount_cents, None);
    }

    #[test]
    fn invalid_date_always_drops() {
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.00", "not a date")],
        };
        // Even the most lenient amount policy never rescues a bad date.
        let cfg = config("invalid_amount = \"coerce_zero\"\n");
        let (lines, dropped) = normalize_batch(&batch, &cfg).unwrap();
        assert!(lines.is_empty());
        assert_eq!(dropped.invalid_date, 1);
    }

    #[test]
    fn day_truncation_flag() {
        let batch = RawBatch {
            period_label: "2024".into(),
            records: vec![full_record("10.00", "2024-03-01 17:30:12")],
        };
        let (lines, _) = normalize_batch(&batch, &config("truncate_to_day = true\n")).unwrap();
        assert_eq!(
            lines[0].created_at,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn csv_batch_roundtrip() {
        let csv = "\
channel,site,document_type,customer_id,item_status,total_amount,created_at,order_id,quantity
Juntoz,Juntoz,DNI,c_1,Received,\"10,50\",2024-03-01,o_1,2
";
        let batch = load_csv_batch("2024", csv).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0]["total_amount"], "10,50");

        let (lines, _) = normalize_batch(&batch, &config("")).unwrap();
        assert_eq!(lines[0].amount_cents, Some(1050));
        assert_eq!(lines[0].quantity, 2);
    }
}

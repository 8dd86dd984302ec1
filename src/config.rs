use serde::Deserialize;

use crate::error::LtvError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LtvConfig {
    pub name: String,
    /// Period labels in ascending order; this order is the concatenation
    /// order for aggregation and the order of the per-period rollups.
    pub periods: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterRule>,
    #[serde(default)]
    pub invalid_amount: InvalidAmountPolicy,
    #[serde(default)]
    pub truncate_to_day: bool,
    #[serde(default = "default_bulk_threshold")]
    pub bulk_quantity_threshold: u32,
    #[serde(default)]
    pub recency: RecencyThresholds,
    #[serde(default)]
    pub frequency: FrequencyThresholds,
    #[serde(default = "default_value_percentiles")]
    pub value_percentiles: Vec<f64>,
    #[serde(default = "default_vip_percentile")]
    pub vip_percentile: f64,
    #[serde(default)]
    pub retention: Option<RetentionPair>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_bulk_threshold() -> u32 {
    2
}

fn default_value_percentiles() -> Vec<f64> {
    vec![25.0, 50.0, 75.0, 90.0]
}

fn default_vip_percentile() -> f64 {
    99.0
}

fn default_top_n() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Filters + policies
// ---------------------------------------------------------------------------

/// One predicate over a raw input field. Exactly one of `equals` / `one_of`
/// must be set; rows failing any rule are dropped at ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRule {
    pub field: String,
    #[serde(default)]
    pub equals: Option<String>,
    #[serde(default)]
    pub one_of: Option<Vec<String>>,
}

impl FilterRule {
    pub fn accepts(&self, value: &str) -> bool {
        match (&self.equals, &self.one_of) {
            (Some(expected), _) => value == expected,
            (None, Some(allowed)) => allowed.iter().any(|v| v == value),
            (None, None) => true,
        }
    }
}

/// What to do with a row whose amount does not parse. Dates are never
/// subject to a policy: an unparsable date always drops the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidAmountPolicy {
    DropRow,
    CoerceZero,
    PropagateNull,
}

impl Default for InvalidAmountPolicy {
    fn default() -> Self {
        Self::DropRow
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecencyThresholds {
    /// `days_since < active_within_days` → Active.
    pub active_within_days: i64,
    /// `days_since >= dormant_after_days` → Dormant; between the two → AtRisk.
    pub dormant_after_days: i64,
}

impl Default for RecencyThresholds {
    fn default() -> Self {
        Self {
            active_within_days: 180,
            dormant_after_days: 365,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FrequencyThresholds {
    /// Minimum distinct orders for Recurrent.
    pub recurrent_min: usize,
    /// Minimum distinct orders for Loyal (checked before Recurrent).
    pub loyal_min: usize,
}

impl Default for FrequencyThresholds {
    fn default() -> Self {
        Self {
            recurrent_min: 2,
            loyal_min: 5,
        }
    }
}

/// Cohort pair for retention: both labels must be configured periods.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionPair {
    pub earlier: String,
    pub later: String,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LtvConfig {
    pub fn from_toml(input: &str) -> Result<Self, LtvError> {
        let config: LtvConfig =
            toml::from_str(input).map_err(|e| LtvError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LtvError> {
        if self.periods.is_empty() {
            return Err(LtvError::ConfigValidation(
                "at least one period is required".into(),
            ));
        }

        for (i, label) in self.periods.iter().enumerate() {
            if self.periods[..i].contains(label) {
                return Err(LtvError::ConfigValidation(format!(
                    "duplicate period label '{label}'"
                )));
            }
        }

        for rule in &self.filters {
            match (&rule.equals, &rule.one_of) {
                (Some(_), Some(_)) => {
                    return Err(LtvError::ConfigValidation(format!(
                        "filter on '{}': set either 'equals' or 'one_of', not both",
                        rule.field
                    )));
                }
                (None, None) => {
                    return Err(LtvError::ConfigValidation(format!(
                        "filter on '{}': one of 'equals' or 'one_of' is required",
                        rule.field
                    )));
                }
                _ => {}
            }
        }

        if let Some(ref pair) = self.retention {
            for label in [&pair.earlier, &pair.later] {
                if !self.periods.contains(label) {
                    return Err(LtvError::ConfigValidation(format!(
                        "retention cohort '{label}' is not a configured period"
                    )));
                }
            }
            let earlier_idx = self.periods.iter().position(|p| p == &pair.earlier);
            let later_idx = self.periods.iter().position(|p| p == &pair.later);
            if earlier_idx >= later_idx {
                return Err(LtvError::ConfigValidation(format!(
                    "retention cohorts must be ordered: '{}' does not precede '{}'",
                    pair.earlier, pair.later
                )));
            }
        }

        let mut prev = 0.0_f64;
        for &p in &self.value_percentiles {
            if !(0.0..=100.0).contains(&p) || p <= prev {
                return Err(LtvError::ConfigValidation(format!(
                    "value_percentiles must be strictly increasing within (0, 100], got {p}"
                )));
            }
            prev = p;
        }
        if !(0.0..=100.0).contains(&self.vip_percentile) {
            return Err(LtvError::ConfigValidation(format!(
                "vip_percentile must be within [0, 100], got {}",
                self.vip_percentile
            )));
        }
        if let Some(&last) = self.value_percentiles.last() {
            if last >= self.vip_percentile {
                return Err(LtvError::ConfigValidation(format!(
                    "value_percentiles must stay below vip_percentile ({})",
                    self.vip_percentile
                )));
            }
        }

        if self.recency.active_within_days <= 0
            || self.recency.dormant_after_days <= self.recency.active_within_days
        {
            return Err(LtvError::ConfigValidation(
                "recency thresholds must satisfy 0 < active_within_days < dormant_after_days"
                    .into(),
            ));
        }

        if self.frequency.recurrent_min < 2 || self.frequency.loyal_min < self.frequency.recurrent_min {
            return Err(LtvError::ConfigValidation(
                "frequency thresholds must satisfy 2 <= recurrent_min <= loyal_min".into(),
            ));
        }

        if self.top_n == 0 {
            return Err(LtvError::ConfigValidation("top_n must be at least 1".into()));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::fmt;

#[derive(Debug)]
pub enum LtvError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad filter rule, unknown period, etc.).
    ConfigValidation(String),
    /// A batch is missing a required field; fails that batch only.
    SchemaMismatch { period: String, field: String },
    /// Zero clean rows remain across all periods. Fatal.
    EmptyDataset,
    /// CSV decode error in the convenience loader.
    Csv(String),
}

impl fmt::Display for LtvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::SchemaMismatch { period, field } => {
                write!(f, "period '{period}': missing required field '{field}'")
            }
            Self::EmptyDataset => {
                write!(f, "no order lines remain after filtering; cannot build a report")
            }
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
        }
    }
}

impl std::error::Error for LtvError {}

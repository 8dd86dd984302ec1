//! `ltv-engine` — Customer lifetime value analytics for multi-period order
//! extracts.
//!
//! Pure engine crate: receives pre-loaded record batches, returns one
//! deterministic report payload. No file I/O, no rendering, no clock reads.

pub mod aggregate;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod model;
pub mod report;

pub use config::LtvConfig;
pub use engine::{run, LtvInput};
pub use error::LtvError;
pub use ingest::{load_csv_batch, RawBatch};
pub use model::{LtvReport, OrderLine};

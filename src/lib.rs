// revlog-export - Export an Anki collection's review history as JSONL

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod join;
pub mod jsonl;
pub mod markup;
pub mod models;
pub mod store;

#[cfg(test)]
mod testutil;

// Re-export main types for convenience
pub use config::{ExportConfig, ExportPlan};
pub use error::{ExportError, Result, exit_code};
pub use export::{CancelToken, ExportResult, Exporter, ProgressCallback, run};
pub use filter::FilterSpec;
pub use join::{SkipCounts, SkipReason};
pub use jsonl::{CompactReview, ExportedLine, ExportedReview, SchemaOptions, VerifyReport, read_export, verify_export};
pub use models::{Card, Deck, Grade, Interval, JoinedRecord, Note, ReviewEvent, ReviewType};
pub use store::{SchemaKind, Store, StoreStats};

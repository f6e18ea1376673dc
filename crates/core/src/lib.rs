//! Orchestration for CoralIngest: URL sources, record reconciliation, the
//! persistence executor, and the end-to-end import pipeline.

pub mod executor;
pub mod pipeline;
pub mod reconcile;
pub mod sources;

pub use executor::{CommitJob, CommitOutcome, PersistExecutor};
pub use pipeline::{
    ImportResult, ProgressReporter, SilentProgress, run_geocode_missing, run_import,
};
pub use reconcile::{build_record, merge_missing};
pub use sources::read_urls;

// Header flags are parsed at the CLI boundary; surface the parser here so
// the app does not need a direct browser dependency.
pub use coralingest_browser::parse_header_flag;

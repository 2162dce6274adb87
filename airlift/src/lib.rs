// The cache-and-refresh engine behind the launcher: on-disk table snapshots
// with a staleness-driven background refresh, fed by the Airtable API behind
// the OAuth credential lifecycle.
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod schema_cache;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod testing;

pub use config::Settings;
pub use error::CacheError;
pub use scheduler::RefreshScheduler;
pub use schema_cache::SchemaCache;
pub use snapshot::{RebuildOutcome, RecordCache};
pub use source::{AirtableSource, RemoteSource};
pub use store::{Snapshot, Store};

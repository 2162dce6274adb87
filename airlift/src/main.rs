use airlift::{AirtableSource, RecordCache, Settings, Store};
use anyhow::Result;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = airlift::logging::init_logging()?;
    tracing::info!(log = %log_path.display(), "Starting");

    let settings = Settings::new()?;
    let cache = RecordCache::new(settings.resolve_cache_dir()?)?;
    let source = Arc::new(AirtableSource::connect(settings.base_id.clone().into()).await?);
    let store = Store::new(source, cache, settings.freshness_window());

    let command = std::env::args().nth(1).unwrap_or_else(|| "read".to_string());
    match command.as_str() {
        // Full synchronous rebuild, the analog of a forced refresh.
        "rebuild" => {
            let outcome = store.cache().rebuild_all(store.source()).await?;
            tracing::info!(?outcome, "Rebuild finished");
        }
        "read" => {
            let snapshot = store.read(false).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        other => {
            anyhow::bail!("Unknown command: {} (expected read or rebuild)", other);
        }
    }

    Ok(())
}

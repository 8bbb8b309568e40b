pub mod e621;
pub mod furaffinity;

pub use e621::E621Source;
pub use furaffinity::FurAffinitySource;

use crate::config::{EngineConfig, SourceKind};
use crate::fetcher::RateLimitedSource;
use crate::traits::ContentSource;
use crate::types::Result;
use std::sync::Arc;
use tracing::info;

/// Build the configured sources in registration order, each behind its own gate.
pub fn build_sources(config: &EngineConfig) -> Result<Vec<RateLimitedSource>> {
    let mut sources = Vec::with_capacity(config.sources.len());

    for source_config in &config.sources {
        let fetch_config = source_config.fetch_config();
        let source: Arc<dyn ContentSource> = match source_config.kind {
            SourceKind::E621 => Arc::new(E621Source::new(
                source_config.base_url.clone(),
                source_config.page_size,
                &fetch_config,
            )?),
            SourceKind::FurAffinity => Arc::new(FurAffinitySource::new(
                source_config.base_url.clone(),
                &fetch_config,
            )?),
        };
        info!("Registered source {} (throttle {:?})", source.name(), source_config.throttle());
        sources.push(RateLimitedSource::new(source, source_config.throttle()));
    }

    Ok(sources)
}

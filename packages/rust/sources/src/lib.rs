//! Publisher adapters and the HTTP plumbing they share.
//!
//! This crate provides:
//! - [`SourceAdapter`], the discover / fetch-detail capability per publisher
//! - [`adapters`], built-in adapters for CNN, BBC, Al Jazeera, The Guardian and Reuters
//! - [`SourceRegistry`], which builds the configured adapters in order
//! - [`HttpFetcher`], the shared reqwest client

pub mod adapters;
pub mod http;

use std::sync::Arc;

use newsdesk_shared::{AppConfig, Result, SourceConfig, SourceKind};

pub use adapters::{
    AlJazeeraAdapter, BbcAdapter, CnnAdapter, GuardianAdapter, ReutersAdapter, SourceAdapter,
};
pub use http::HttpFetcher;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The adapters for one sync run, in configuration order.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Build an adapter for every enabled `[[sources]]` entry.
    ///
    /// When `only` is non-empty, entries whose kind is not listed are skipped.
    pub fn from_config(config: &AppConfig, only: &[SourceKind]) -> Result<Self> {
        let http = HttpFetcher::new(&config.http)?;
        let mut sources = Vec::new();

        for entry in &config.sources {
            if !entry.enabled {
                tracing::debug!(source = %entry.kind, "source disabled");
                continue;
            }
            if !only.is_empty() && !only.contains(&entry.kind) {
                continue;
            }
            let http = if entry.headers.is_empty() {
                http.clone()
            } else {
                http.with_headers(&entry.headers)?
            };
            sources.push(build_adapter(http, entry)?);
        }

        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.sources
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn build_adapter(http: HttpFetcher, entry: &SourceConfig) -> Result<Arc<dyn SourceAdapter>> {
    let adapter: Arc<dyn SourceAdapter> = match entry.kind {
        SourceKind::Cnn => Arc::new(CnnAdapter::new(http, entry)?),
        SourceKind::Bbc => Arc::new(BbcAdapter::new(http, entry)?),
        SourceKind::Aljazeera => Arc::new(AlJazeeraAdapter::new(http, entry)?),
        SourceKind::Guardian => Arc::new(GuardianAdapter::new(http, entry)?),
        SourceKind::Reuters => Arc::new(ReutersAdapter::new(http, entry)?),
    };
    Ok(adapter)
}

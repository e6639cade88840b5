//! Application layer: use cases over the catalog
//!
//! Each service owns the repositories it needs and is driven by the CLI or
//! by tests with in-memory sources.

pub mod catalog_service;
pub mod collection_service;
pub mod enrichment_service;
pub mod import_service;
pub mod price_service;
pub mod verification_service;

pub use catalog_service::CatalogService;
pub use collection_service::CollectionService;
pub use enrichment_service::{EnrichmentReport, EnrichmentService};
pub use import_service::{ImportOptions, ImportRunReport, ImportService, RescrapeReport, SeriesImportReport};
pub use price_service::{PriceService, PriceUpdateReport};
pub use verification_service::{CountCheck, CountStatus, StatusReport, VerificationService};

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleep for `delay` unless cancelled first. Returns `false` when cancelled.
pub(crate) async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_stops_early_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = std::time::Instant::now();
        assert!(!pause(Duration::from_secs(30), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn zero_pause_returns_immediately() {
        assert!(pause(Duration::ZERO, &CancellationToken::new()).await);
    }
}

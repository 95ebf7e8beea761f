//! Offset-based pagination walk over a vendor event endpoint.
//!
//! The walk is lazy and restartable: re-running the same query yields the
//! same logical record set modulo upstream-side changes. A page whose
//! retries are exhausted is skipped and recorded, never fatal for the walk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pitchsync_core::SkippedPage;
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::fetch::FetchError;

/// One decoded page of raw vendor records.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub offset: u32,
    pub records: Vec<JsonValue>,
    /// Explicit "no more data" signal from the vendor, when it sends one.
    pub end_of_data: bool,
}

/// A paginated vendor endpoint for one scope. Implementations own the URL
/// construction, auth, and body decoding; retries happen below this seam.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn source_id(&self) -> &str;
    async fn fetch_page(&self, offset: u32) -> Result<RawPage, FetchError>;
}

/// Cooperative cancellation, checked before each page request. Aborting
/// mid-walk is safe: everything already upserted is keyed by NaturalKey.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalkConfig {
    pub page_size: u32,
    /// Hard bound on API calls per walk, so a misbehaving vendor cannot
    /// drag a run into an unbounded loop.
    pub max_pages: u32,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 500,
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchAllOutcome {
    pub records: Vec<JsonValue>,
    pub skipped: Vec<SkippedPage>,
    pub pages_fetched: usize,
    pub cancelled: bool,
}

/// Walks pages from offset 0 until a short page, an explicit end-of-data
/// signal, cancellation, or the page bound.
pub async fn fetch_all(
    source: &dyn PageSource,
    config: WalkConfig,
    cancel: &CancelFlag,
) -> FetchAllOutcome {
    let mut outcome = FetchAllOutcome::default();
    let mut offset = 0u32;

    for _ in 0..config.max_pages {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        match source.fetch_page(offset).await {
            Ok(page) => {
                outcome.pages_fetched += 1;
                let short_page = (page.records.len() as u32) < config.page_size;
                outcome.records.extend(page.records);
                if page.end_of_data || short_page {
                    break;
                }
            }
            Err(err) => {
                // Fail partial, not total: later offsets may still load, and
                // a later run retries what was skipped here.
                warn!(
                    source_id = source.source_id(),
                    offset,
                    error = %err,
                    "skipping page after exhausted retries"
                );
                outcome.skipped.push(SkippedPage {
                    source_id: source.source_id().to_string(),
                    offset,
                    reason: err.to_string(),
                });
            }
        }

        offset += config.page_size;
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct ScriptedSource {
        pages: Mutex<Vec<Result<RawPage, FetchError>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<RawPage, FetchError>>) -> Self {
            Self {
                pages: Mutex::new(pages),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        fn source_id(&self) -> &str {
            "scripted"
        }

        async fn fetch_page(&self, _offset: u32) -> Result<RawPage, FetchError> {
            self.pages.lock().await.remove(0)
        }
    }

    fn full_page(offset: u32, n: usize) -> RawPage {
        RawPage {
            offset,
            records: (0..n).map(|i| json!({ "row": i })).collect(),
            end_of_data: false,
        }
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let source = ScriptedSource::new(vec![Ok(full_page(0, 3)), Ok(full_page(3, 1))]);
        let config = WalkConfig {
            page_size: 3,
            max_pages: 10,
        };
        let outcome = fetch_all(&source, config, &CancelFlag::new()).await;
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.pages_fetched, 2);
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn stops_on_explicit_end_of_data() {
        let mut page = full_page(0, 3);
        page.end_of_data = true;
        let source = ScriptedSource::new(vec![Ok(page)]);
        let config = WalkConfig {
            page_size: 3,
            max_pages: 10,
        };
        let outcome = fetch_all(&source, config, &CancelFlag::new()).await;
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.pages_fetched, 1);
    }

    #[tokio::test]
    async fn dead_page_is_skipped_and_recorded() {
        let source = ScriptedSource::new(vec![
            Ok(full_page(0, 2)),
            Err(FetchError::HttpStatus {
                status: 503,
                url: "https://vendor/events?offset=2".into(),
            }),
            Ok(full_page(4, 1)),
        ]);
        let config = WalkConfig {
            page_size: 2,
            max_pages: 10,
        };
        let outcome = fetch_all(&source, config, &CancelFlag::new()).await;
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].offset, 2);
        assert_eq!(outcome.skipped[0].source_id, "scripted");
    }

    #[tokio::test]
    async fn cancellation_is_checked_before_each_request() {
        let source = ScriptedSource::new(vec![Ok(full_page(0, 2))]);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = fetch_all(&source, WalkConfig::default(), &cancel).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.pages_fetched, 0);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn page_bound_terminates_a_chatty_vendor() {
        let pages: Vec<_> = (0..5).map(|i| Ok(full_page(i * 2, 2))).collect();
        let source = ScriptedSource::new(pages);
        let config = WalkConfig {
            page_size: 2,
            max_pages: 3,
        };
        let outcome = fetch_all(&source, config, &CancelFlag::new()).await;
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.records.len(), 6);
    }
}

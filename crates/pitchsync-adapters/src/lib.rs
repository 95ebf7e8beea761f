//! Vendor adapter contracts: page URL construction, page decoding, and
//! normalization of heterogeneous vendor payloads into canonical events.

pub mod api_football;
pub mod sportsdb;

use std::sync::Arc;

use async_trait::async_trait;
use pitchsync_core::{EventType, MatchEvent, ScopeId};
use pitchsync_source::{FetchError, PageFetcher, PageSource, RawPage, RawPageStore, VendorAuth};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub use api_football::ApiFootballAdapter;
pub use sportsdb::SportsDbAdapter;

pub const CRATE_NAME: &str = "pitchsync-adapters";

/// A malformed or unmappable vendor record. Dropped with a logged reason;
/// never aborts a run.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown event type `{0}`")]
    UnknownEventType(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Decoded page body, before per-record normalization.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub records: Vec<JsonValue>,
    pub end_of_data: bool,
}

/// One upstream vendor. URL shape, auth header name, page envelope, and
/// record normalization all live behind this trait; the rest of the
/// pipeline only sees canonical `MatchEvent`s.
pub trait VendorAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Header name carrying the static API key for this vendor.
    fn auth_header(&self) -> &'static str;

    fn page_url(&self, base_url: &str, scope: &ScopeId, offset: u32, page_size: u32) -> String;

    fn parse_page(&self, body: &[u8]) -> Result<ParsedPage, NormalizeError>;

    /// Pure mapping of one vendor record into a canonical event. No I/O.
    fn normalize(&self, scope: &ScopeId, record: &JsonValue)
        -> Result<MatchEvent, NormalizeError>;
}

pub fn adapter_for_source(source_id: &str) -> Option<Arc<dyn VendorAdapter>> {
    match source_id {
        "api-football" => Some(Arc::new(ApiFootballAdapter)),
        "sportsdb" => Some(Arc::new(SportsDbAdapter)),
        _ => None,
    }
}

/// Shared goal sub-classification used by both vendor families: the free-
/// text detail decides penalty vs own goal vs regular goal. Own goals map
/// to their own type so they can never merge with, or count as, a player's
/// goal.
pub fn classify_goal_detail(detail: Option<&str>) -> EventType {
    match detail {
        Some(d) if d.eq_ignore_ascii_case("Own Goal") => EventType::OwnGoal,
        Some(d) if d.eq_ignore_ascii_case("Penalty") => EventType::Penalty,
        Some(d)
            if d.eq_ignore_ascii_case("Missed Penalty")
                || d.eq_ignore_ascii_case("Penalty Missed") =>
        {
            EventType::MissedPenalty
        }
        _ => EventType::Goal,
    }
}

/// Binds one vendor adapter to an HTTP fetcher for one scope, optionally
/// archiving every page body before it is decoded.
pub struct HttpVendorSource {
    adapter: Arc<dyn VendorAdapter>,
    fetcher: PageFetcher,
    base_url: String,
    auth: Option<VendorAuth>,
    scope: ScopeId,
    page_size: u32,
    run_id: Uuid,
    archive: Option<RawPageStore>,
}

impl HttpVendorSource {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn VendorAdapter>,
        fetcher: PageFetcher,
        base_url: impl Into<String>,
        auth: Option<VendorAuth>,
        scope: ScopeId,
        page_size: u32,
        run_id: Uuid,
        archive: Option<RawPageStore>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            base_url: base_url.into(),
            auth,
            scope,
            page_size,
            run_id,
            archive,
        }
    }

    pub fn adapter(&self) -> &Arc<dyn VendorAdapter> {
        &self.adapter
    }
}

#[async_trait]
impl PageSource for HttpVendorSource {
    fn source_id(&self) -> &str {
        self.adapter.source_id()
    }

    async fn fetch_page(&self, offset: u32) -> Result<RawPage, FetchError> {
        let url = self
            .adapter
            .page_url(&self.base_url, &self.scope, offset, self.page_size);
        let fetched = self
            .fetcher
            .get(self.run_id, self.adapter.source_id(), &url, self.auth.as_ref())
            .await?;

        if let Some(archive) = &self.archive {
            // Archiving is best-effort traceability; a full disk must not
            // kill the fetch.
            if let Err(err) = archive
                .store_page(self.run_id, self.adapter.source_id(), offset, &fetched.body)
                .await
            {
                warn!(source_id = self.adapter.source_id(), error = %err, "failed to archive page body");
            }
        }

        let parsed = self
            .adapter
            .parse_page(&fetched.body)
            .map_err(|err| FetchError::Decode {
                url: fetched.final_url.clone(),
                reason: err.to_string(),
            })?;

        Ok(RawPage {
            offset,
            records: parsed.records,
            end_of_data: parsed.end_of_data,
        })
    }
}

pub(crate) fn json_str(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_u16(value: &JsonValue) -> Option<u16> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|v| u16::try_from(v).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_details_classify_onto_canonical_types() {
        assert_eq!(classify_goal_detail(Some("Normal Goal")), EventType::Goal);
        assert_eq!(classify_goal_detail(Some("Own Goal")), EventType::OwnGoal);
        assert_eq!(classify_goal_detail(Some("own goal")), EventType::OwnGoal);
        assert_eq!(classify_goal_detail(Some("Penalty")), EventType::Penalty);
        assert_eq!(
            classify_goal_detail(Some("Missed Penalty")),
            EventType::MissedPenalty
        );
        assert_eq!(classify_goal_detail(None), EventType::Goal);
    }

    #[test]
    fn known_sources_resolve_to_adapters() {
        assert!(adapter_for_source("api-football").is_some());
        assert!(adapter_for_source("sportsdb").is_some());
        assert!(adapter_for_source("highlightly").is_none());
    }
}

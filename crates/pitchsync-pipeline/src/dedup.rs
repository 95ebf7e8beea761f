//! Deduplication engine: collapses vendor records describing the same
//! real-world occurrence down to one representative per NaturalKey.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use pitchsync_core::MatchEvent;

/// Per-scope engine; build one per run, never share across scopes.
///
/// Tie-break between records with equal keys, in order: earliest
/// `ingested_at` (absent sorts last), then the vendor earliest in the trust
/// priority list, then the lexicographically smallest `source_record_id`.
/// The last rung makes the choice reproducible even for records that are
/// byte-identical apart from vendor row ids.
pub struct DedupEngine {
    source_priority: Vec<String>,
}

#[derive(Debug)]
pub struct DedupOutcome {
    /// Surviving representatives, ordered by NaturalKey.
    pub events: Vec<MatchEvent>,
    pub collapsed: usize,
}

impl DedupEngine {
    pub fn new(source_priority: Vec<String>) -> Self {
        Self { source_priority }
    }

    fn trust_rank(&self, source_id: &str) -> usize {
        self.source_priority
            .iter()
            .position(|s| s == source_id)
            .unwrap_or(self.source_priority.len())
    }

    fn prefer(&self, a: &MatchEvent, b: &MatchEvent) -> Ordering {
        let ingested = match (a.ingested_at, b.ingested_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        ingested
            .then_with(|| self.trust_rank(&a.source_id).cmp(&self.trust_rank(&b.source_id)))
            .then_with(|| a.source_record_id.cmp(&b.source_record_id))
    }

    /// Safe to re-run on a superset of previously seen events: feeding the
    /// output back in reproduces it unchanged.
    pub fn dedupe(&self, events: Vec<MatchEvent>) -> DedupOutcome {
        let total = events.len();
        let mut groups: BTreeMap<_, MatchEvent> = BTreeMap::new();

        for event in events {
            let key = event.natural_key();
            match groups.get_mut(&key) {
                None => {
                    groups.insert(key, event);
                }
                Some(kept) => {
                    if self.prefer(&event, kept) == Ordering::Less {
                        *kept = event;
                    }
                }
            }
        }

        let events: Vec<_> = groups.into_values().collect();
        DedupOutcome {
            collapsed: total - events.len(),
            events,
        }
    }
}

//! Reconciliation verifier: compares computed stat lines against an
//! authoritative ranking feed and reports drift. Strictly observational;
//! nothing here ever mutates computed statistics.

use pitchsync_core::{PlayerStatLine, ReconciliationDiff, StatName};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use tracing::warn;

/// One row of the official ranking list. No shared identifier with our
/// events, so matching is by name/team heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialEntry {
    pub player_name: String,
    pub team_name: Option<String>,
    pub stat: StatName,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileFinding {
    Diff(ReconciliationDiff),
    /// Multiple equally plausible players for one official row. Reported,
    /// never silently resolved; the official team name rides along so an
    /// operator can break the tie by hand.
    AmbiguousMatch {
        player_name: String,
        team_name: Option<String>,
        stat: StatName,
        candidate_player_ids: Vec<String>,
    },
}

/// Lowercase, fold diacritics, strip punctuation, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'ā' | 'ă' => folded.push('a'),
            'é' | 'è' | 'ê' | 'ë' | 'ē' | 'ě' | 'ę' => folded.push('e'),
            'í' | 'ì' | 'î' | 'ï' | 'ī' => folded.push('i'),
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'ō' => folded.push('o'),
            'ú' | 'ù' | 'û' | 'ü' | 'ū' | 'ů' => folded.push('u'),
            'ý' | 'ÿ' => folded.push('y'),
            'ç' | 'ć' | 'č' => folded.push('c'),
            'ñ' | 'ń' | 'ň' => folded.push('n'),
            'š' | 'ś' => folded.push('s'),
            'ž' | 'ź' | 'ż' => folded.push('z'),
            'ł' => folded.push('l'),
            'đ' => folded.push('d'),
            'ğ' => folded.push('g'),
            'ß' => folded.push_str("ss"),
            c if c.is_alphanumeric() => folded.push(c),
            _ => folded.push(' '),
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
enum MatchOutcome<'a> {
    Unique(&'a PlayerStatLine),
    Ambiguous(Vec<&'a PlayerStatLine>),
    NoMatch,
}

/// Scored-candidate matcher: exact normalized match, then substring
/// containment, then jaro-winkler above `fuzzy_threshold`. Candidates
/// within `tie_epsilon` of the best fuzzy score are a tie.
///
/// Resolution is name-only. Computed stat lines carry vendor team ids,
/// not team names, so the feed's `team_name` cannot disambiguate
/// automatically; it is surfaced on ambiguous and unmatched rows instead.
#[derive(Debug, Clone, Copy)]
pub struct NameMatcher {
    pub fuzzy_threshold: f64,
    pub tie_epsilon: f64,
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            tie_epsilon: 0.01,
        }
    }
}

impl NameMatcher {
    fn find<'a>(&self, target: &str, lines: &'a [PlayerStatLine]) -> MatchOutcome<'a> {
        let target = normalize_name(target);
        if target.is_empty() {
            return MatchOutcome::NoMatch;
        }

        let named: Vec<(&PlayerStatLine, String)> = lines
            .iter()
            .filter_map(|line| {
                line.player_name
                    .as_deref()
                    .map(|name| (line, normalize_name(name)))
            })
            .collect();

        let exact: Vec<_> = named
            .iter()
            .filter(|(_, name)| *name == target)
            .map(|(line, _)| *line)
            .collect();
        match exact.len() {
            1 => return MatchOutcome::Unique(exact[0]),
            n if n > 1 => return MatchOutcome::Ambiguous(exact),
            _ => {}
        }

        let contained: Vec<_> = named
            .iter()
            .filter(|(_, name)| name.contains(&target) || target.contains(name.as_str()))
            .map(|(line, _)| *line)
            .collect();
        match contained.len() {
            1 => return MatchOutcome::Unique(contained[0]),
            n if n > 1 => return MatchOutcome::Ambiguous(contained),
            _ => {}
        }

        let mut scored: Vec<(f64, &PlayerStatLine)> = named
            .iter()
            .map(|(line, name)| (jaro_winkler(name, &target), *line))
            .filter(|(score, _)| *score >= self.fuzzy_threshold)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.player_id.cmp(&b.1.player_id)));

        match scored.first() {
            None => MatchOutcome::NoMatch,
            Some(&(best, _)) => {
                let tied: Vec<_> = scored
                    .iter()
                    .filter(|(score, _)| best - score <= self.tie_epsilon)
                    .map(|(_, line)| *line)
                    .collect();
                if tied.len() == 1 {
                    MatchOutcome::Unique(tied[0])
                } else {
                    MatchOutcome::Ambiguous(tied)
                }
            }
        }
    }
}

/// Compare computed stat lines against the official feed. Emits one diff
/// per matched row whose delta is non-zero, and one `AmbiguousMatch` per
/// unresolvable official row.
pub fn reconcile(
    lines: &[PlayerStatLine],
    feed: &[OfficialEntry],
    matcher: &NameMatcher,
) -> Vec<ReconcileFinding> {
    let mut findings = Vec::new();

    for entry in feed {
        match matcher.find(&entry.player_name, lines) {
            MatchOutcome::Unique(line) => {
                let computed = i64::from(line.stat(entry.stat));
                let delta = computed - entry.value;
                if delta != 0 {
                    findings.push(ReconcileFinding::Diff(ReconciliationDiff {
                        player_id: line.player_id.clone(),
                        stat: entry.stat,
                        computed,
                        official: entry.value,
                        delta,
                    }));
                }
            }
            MatchOutcome::Ambiguous(candidates) => {
                findings.push(ReconcileFinding::AmbiguousMatch {
                    player_name: entry.player_name.clone(),
                    team_name: entry.team_name.clone(),
                    stat: entry.stat,
                    candidate_player_ids: candidates
                        .iter()
                        .map(|line| line.player_id.clone())
                        .collect(),
                });
            }
            MatchOutcome::NoMatch => {
                warn!(
                    player_name = entry.player_name.as_str(),
                    team_name = entry.team_name.as_deref().unwrap_or("?"),
                    "official feed row matched no computed stat line"
                );
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchsync_core::ScopeId;

    fn line(player_id: &str, name: &str, goals: u32) -> PlayerStatLine {
        let mut line = PlayerStatLine::empty(player_id, ScopeId::new("39", "2025"));
        line.player_name = Some(name.to_string());
        line.goals = goals;
        line
    }

    fn goals_entry(name: &str, value: i64) -> OfficialEntry {
        OfficialEntry {
            player_name: name.to_string(),
            team_name: None,
            stat: StatName::Goals,
            value,
        }
    }

    #[test]
    fn normalization_strips_case_diacritics_and_punctuation() {
        assert_eq!(normalize_name("Martin Ødegaard"), "martin odegaard");
        assert_eq!(normalize_name("N'Golo Kanté"), "n golo kante");
        assert_eq!(normalize_name("  SAKA,  Bukayo "), "saka bukayo");
    }

    #[test]
    fn non_zero_delta_is_reported() {
        let lines = vec![line("p42", "Erling Haaland", 4)];
        let feed = vec![goals_entry("Erling Håland", 5)];
        let findings = reconcile(&lines, &feed, &NameMatcher::default());
        assert_eq!(
            findings,
            vec![ReconcileFinding::Diff(ReconciliationDiff {
                player_id: "p42".into(),
                stat: StatName::Goals,
                computed: 4,
                official: 5,
                delta: -1,
            })]
        );
    }

    #[test]
    fn matching_totals_stay_silent() {
        let lines = vec![line("p42", "Erling Haaland", 5)];
        let feed = vec![goals_entry("Erling Haaland", 5)];
        assert!(reconcile(&lines, &feed, &NameMatcher::default()).is_empty());
    }

    #[test]
    fn substring_containment_matches_short_official_names() {
        let lines = vec![line("p17", "Gabriel Martinelli Silva", 3)];
        let feed = vec![goals_entry("Martinelli", 2)];
        let findings = reconcile(&lines, &feed, &NameMatcher::default());
        assert_eq!(findings.len(), 1);
        assert!(matches!(
            &findings[0],
            ReconcileFinding::Diff(d) if d.player_id == "p17" && d.delta == 1
        ));
    }

    #[test]
    fn equally_plausible_candidates_are_ambiguous_not_guessed() {
        let lines = vec![
            line("p1", "Gabriel Silva", 2),
            line("p2", "Gabriel Silva", 1),
        ];
        let mut entry = goals_entry("Gabriel Silva", 2);
        entry.team_name = Some("Arsenal".into());
        let findings = reconcile(&lines, &[entry], &NameMatcher::default());
        assert_eq!(
            findings,
            vec![ReconcileFinding::AmbiguousMatch {
                player_name: "Gabriel Silva".into(),
                team_name: Some("Arsenal".into()),
                stat: StatName::Goals,
                candidate_player_ids: vec!["p1".into(), "p2".into()],
            }]
        );
    }

    #[test]
    fn unmatched_rows_emit_nothing() {
        let lines = vec![line("p42", "Erling Haaland", 5)];
        let feed = vec![goals_entry("Somebody Unrelated", 9)];
        assert!(reconcile(&lines, &feed, &NameMatcher::default()).is_empty());
    }
}

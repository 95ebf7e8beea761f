//! Aggregation engine: folds a deduplicated event stream into per-player,
//! per-scope stat lines. Pure, full recompute every run; never patched
//! incrementally.

use std::collections::{BTreeMap, BTreeSet};

use pitchsync_core::{EventType, MatchEvent, PlayerStatLine, ScopeId};

#[derive(Default)]
struct PlayerAccumulator {
    names: BTreeSet<String>,
    goals: u32,
    assists: u32,
    yellow_cards: u32,
    red_cards: u32,
    matches: BTreeSet<String>,
}

impl PlayerAccumulator {
    fn note_name(&mut self, name: Option<&str>) {
        if let Some(name) = name {
            self.names.insert(name.to_string());
        }
    }
}

/// Every counter here is a plain sum and the maps are ordered, so output is
/// identical for any permutation of the input.
pub fn aggregate(events: &[MatchEvent]) -> Vec<PlayerStatLine> {
    let mut players: BTreeMap<(ScopeId, String), PlayerAccumulator> = BTreeMap::new();

    for event in events {
        if let Some(player_id) = &event.player_id {
            let acc = players
                .entry((event.scope.clone(), player_id.clone()))
                .or_default();
            acc.note_name(event.player_name.as_deref());
            // Any attributed event marks the player as having played this
            // match, so scorers and carded players never need an explicit
            // appearance record.
            acc.matches.insert(event.match_id.clone());

            match event.event_type {
                EventType::Goal | EventType::Penalty => acc.goals += 1,
                // Credited to the scoring team, never to the scorer.
                EventType::OwnGoal => {}
                EventType::YellowCard => acc.yellow_cards += 1,
                EventType::RedCard => acc.red_cards += 1,
                EventType::MissedPenalty
                | EventType::Substitution
                | EventType::Appearance => {}
            }
        }

        if event.event_type.carries_assist() {
            if let Some(assist_id) = &event.assist_player_id {
                let acc = players
                    .entry((event.scope.clone(), assist_id.clone()))
                    .or_default();
                acc.note_name(event.assist_player_name.as_deref());
                acc.assists += 1;
                acc.matches.insert(event.match_id.clone());
            }
        }
    }

    players
        .into_iter()
        .map(|((scope, player_id), acc)| PlayerStatLine {
            player_id,
            player_name: acc.names.first().cloned(),
            scope,
            goals: acc.goals,
            assists: acc.assists,
            yellow_cards: acc.yellow_cards,
            red_cards: acc.red_cards,
            appearances: acc.matches.len() as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeId {
        ScopeId::new("39", "2025")
    }

    fn event(match_id: &str, player: &str, event_type: EventType, minute: u16) -> MatchEvent {
        MatchEvent {
            match_id: match_id.into(),
            scope: scope(),
            minute,
            minute_extra: None,
            event_type,
            detail: None,
            team_id: "t1".into(),
            player_id: Some(player.into()),
            player_name: Some(format!("Player {player}")),
            assist_player_id: None,
            assist_player_name: None,
            source_id: "api-football".into(),
            source_record_id: format!("{match_id}-{player}-{minute}"),
            ingested_at: None,
        }
    }

    fn line<'a>(lines: &'a [PlayerStatLine], player: &str) -> &'a PlayerStatLine {
        lines
            .iter()
            .find(|l| l.player_id == player)
            .expect("stat line for player")
    }

    #[test]
    fn goals_and_penalties_count_toward_the_scorer() {
        let lines = aggregate(&[
            event("m1", "p42", EventType::Goal, 12),
            event("m1", "p42", EventType::Penalty, 70),
            event("m2", "p42", EventType::Goal, 5),
        ]);
        let p42 = line(&lines, "p42");
        assert_eq!(p42.goals, 3);
        assert_eq!(p42.appearances, 2);
    }

    #[test]
    fn own_goals_never_inflate_the_scorer() {
        let lines = aggregate(&[
            event("m1", "p7", EventType::OwnGoal, 30),
            event("m2", "p7", EventType::OwnGoal, 44),
        ]);
        let p7 = line(&lines, "p7");
        assert_eq!(p7.goals, 0);
        // Still played in both matches.
        assert_eq!(p7.appearances, 2);
    }

    #[test]
    fn assists_credit_the_secondary_player_on_goal_events_only() {
        let mut goal = event("m1", "p42", EventType::Goal, 59);
        goal.assist_player_id = Some("p17".into());
        goal.assist_player_name = Some("Player p17".into());
        // Cards and substitutions never carry assists, even if a vendor
        // populates the secondary slot.
        let mut sub = event("m1", "p42", EventType::Substitution, 80);
        sub.assist_player_id = Some("p17".into());

        let lines = aggregate(&[goal, sub]);
        let p17 = line(&lines, "p17");
        assert_eq!(p17.assists, 1);
        assert_eq!(p17.goals, 0);
        assert_eq!(p17.appearances, 1);
    }

    #[test]
    fn cards_tally_by_type() {
        let lines = aggregate(&[
            event("m1", "p3", EventType::YellowCard, 20),
            event("m2", "p3", EventType::YellowCard, 41),
            event("m2", "p3", EventType::RedCard, 88),
        ]);
        let p3 = line(&lines, "p3");
        assert_eq!(p3.yellow_cards, 2);
        assert_eq!(p3.red_cards, 1);
    }

    #[test]
    fn appearance_markers_count_players_with_no_other_events() {
        let lines = aggregate(&[
            event("m1", "p11", EventType::Appearance, 0),
            event("m2", "p11", EventType::Appearance, 0),
            event("m2", "p11", EventType::Goal, 15),
        ]);
        let p11 = line(&lines, "p11");
        assert_eq!(p11.appearances, 2);
        assert_eq!(p11.goals, 1);
    }

    #[test]
    fn output_is_deterministic_for_any_input_order() {
        let mut goal = event("m1", "p42", EventType::Goal, 59);
        goal.assist_player_id = Some("p17".into());
        let events = vec![
            goal,
            event("m1", "p7", EventType::OwnGoal, 30),
            event("m2", "p42", EventType::YellowCard, 9),
            event("m2", "p3", EventType::Appearance, 0),
        ];
        let mut reversed = events.clone();
        reversed.reverse();
        assert_eq!(aggregate(&events), aggregate(&reversed));
    }
}

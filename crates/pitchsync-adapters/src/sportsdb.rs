//! Adapter for the TheSportsDB-style vendor: flat records, every value a
//! string, a `timeline` array with no paging envelope.

use pitchsync_core::{EventType, MatchEvent, ScopeId};
use serde_json::Value as JsonValue;

use crate::{classify_goal_detail, json_str, json_u16, NormalizeError, ParsedPage, VendorAdapter};

pub struct SportsDbAdapter;

impl SportsDbAdapter {
    fn map_event_type(
        record_type: &str,
        detail: Option<&str>,
    ) -> Result<EventType, NormalizeError> {
        match record_type {
            "Goal" => Ok(classify_goal_detail(detail)),
            "Card" => match detail {
                Some(d) if d.eq_ignore_ascii_case("Yellow Card") => Ok(EventType::YellowCard),
                Some(d) if d.eq_ignore_ascii_case("Red Card") => Ok(EventType::RedCard),
                _ => Err(NormalizeError::UnknownEventType(format!(
                    "Card/{}",
                    detail.unwrap_or("?")
                ))),
            },
            "subst" | "Substitution" => Ok(EventType::Substitution),
            "Lineup" => Ok(EventType::Appearance),
            other => Err(NormalizeError::UnknownEventType(other.to_string())),
        }
    }

    /// This vendor sends `""` where it means "no value".
    fn opt_str(record: &JsonValue, field: &str) -> Option<String> {
        record.get(field).and_then(json_str)
    }
}

impl VendorAdapter for SportsDbAdapter {
    fn source_id(&self) -> &'static str {
        "sportsdb"
    }

    fn auth_header(&self) -> &'static str {
        "X-API-KEY"
    }

    fn page_url(&self, base_url: &str, scope: &ScopeId, offset: u32, page_size: u32) -> String {
        format!(
            "{}/timeline.php?l={}&s={}&offset={}&limit={}",
            base_url.trim_end_matches('/'),
            scope.competition_id,
            scope.season,
            offset,
            page_size
        )
    }

    fn parse_page(&self, body: &[u8]) -> Result<ParsedPage, NormalizeError> {
        let value: JsonValue = serde_json::from_slice(body)
            .map_err(|err| NormalizeError::Malformed(err.to_string()))?;

        // A null timeline is this vendor's "no more data" signal.
        match value.get("timeline") {
            Some(JsonValue::Array(records)) => Ok(ParsedPage {
                records: records.clone(),
                end_of_data: false,
            }),
            Some(JsonValue::Null) | None => Ok(ParsedPage {
                records: Vec::new(),
                end_of_data: true,
            }),
            Some(_) => Err(NormalizeError::Malformed(
                "timeline is neither array nor null".into(),
            )),
        }
    }

    fn normalize(
        &self,
        scope: &ScopeId,
        record: &JsonValue,
    ) -> Result<MatchEvent, NormalizeError> {
        let match_id =
            Self::opt_str(record, "idEvent").ok_or(NormalizeError::MissingField("idEvent"))?;
        let record_type = record
            .get("strTimeline")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(NormalizeError::MissingField("strTimeline"))?;
        let detail = record
            .get("strTimelineDetail")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty());
        let event_type = Self::map_event_type(record_type, detail)?;

        let minute = match record.get("intTime").and_then(json_u16) {
            Some(minute) => minute,
            None if event_type == EventType::Appearance => 0,
            None => return Err(NormalizeError::MissingField("intTime")),
        };
        let minute_extra = record.get("intTimeExtra").and_then(json_u16);

        let team_id =
            Self::opt_str(record, "idTeam").ok_or(NormalizeError::MissingField("idTeam"))?;

        let source_record_id = Self::opt_str(record, "idTimeline")
            .unwrap_or_else(|| format!("{}-{}-{}", match_id, minute, event_type));

        Ok(MatchEvent {
            match_id,
            scope: scope.clone(),
            minute,
            minute_extra,
            event_type,
            detail: detail.map(str::to_owned),
            team_id,
            player_id: Self::opt_str(record, "idPlayer"),
            player_name: Self::opt_str(record, "strPlayer"),
            assist_player_id: Self::opt_str(record, "idAssist"),
            assist_player_name: Self::opt_str(record, "strAssist"),
            source_id: self.source_id().to_string(),
            source_record_id,
            ingested_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> ScopeId {
        ScopeId::new("4328", "2025-2026")
    }

    fn goal_record() -> JsonValue {
        json!({
            "idTimeline": "880021",
            "idEvent": "602129",
            "strTimeline": "Goal",
            "strTimelineDetail": "Normal Goal",
            "idPlayer": "34146370",
            "strPlayer": "Bukayo Saka",
            "idAssist": "34159212",
            "strAssist": "Martin Odegaard",
            "idTeam": "133604",
            "intTime": "59"
        })
    }

    #[test]
    fn normalizes_stringly_typed_fields() {
        let event = SportsDbAdapter
            .normalize(&scope(), &goal_record())
            .expect("normalize");
        assert_eq!(event.event_type, EventType::Goal);
        assert_eq!(event.match_id, "602129");
        assert_eq!(event.minute, 59);
        assert_eq!(event.minute_extra, None);
        assert_eq!(event.player_id.as_deref(), Some("34146370"));
        assert_eq!(event.assist_player_name.as_deref(), Some("Martin Odegaard"));
        assert_eq!(event.source_id, "sportsdb");
    }

    #[test]
    fn empty_strings_mean_absent() {
        let mut record = goal_record();
        record["idAssist"] = json!("");
        record["strAssist"] = json!("");
        let event = SportsDbAdapter
            .normalize(&scope(), &record)
            .expect("normalize");
        assert_eq!(event.assist_player_id, None);
        assert_eq!(event.assist_player_name, None);
    }

    #[test]
    fn missing_minute_is_rejected() {
        let mut record = goal_record();
        record["intTime"] = json!("");
        let err = SportsDbAdapter
            .normalize(&scope(), &record)
            .expect_err("should reject");
        assert!(matches!(err, NormalizeError::MissingField("intTime")));
    }

    #[test]
    fn null_timeline_signals_end_of_data() {
        let page = SportsDbAdapter
            .parse_page(br#"{"timeline": null}"#)
            .expect("parse");
        assert!(page.end_of_data);
        assert!(page.records.is_empty());

        let body = json!({ "timeline": [goal_record()] });
        let page = SportsDbAdapter
            .parse_page(body.to_string().as_bytes())
            .expect("parse");
        assert!(!page.end_of_data);
        assert_eq!(page.records.len(), 1);
    }

    #[test]
    fn own_goal_is_a_distinct_type() {
        let mut record = goal_record();
        record["strTimelineDetail"] = json!("Own Goal");
        let event = SportsDbAdapter
            .normalize(&scope(), &record)
            .expect("normalize");
        assert_eq!(event.event_type, EventType::OwnGoal);
    }
}

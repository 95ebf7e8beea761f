//! Adapter for the API-Football-style vendor: nested JSON objects, numeric
//! ids, a `response` array wrapped with `paging` metadata.

use pitchsync_core::{EventType, MatchEvent, ScopeId};
use serde_json::Value as JsonValue;

use crate::{classify_goal_detail, json_str, json_u16, NormalizeError, ParsedPage, VendorAdapter};

pub struct ApiFootballAdapter;

impl ApiFootballAdapter {
    fn map_event_type(
        record_type: &str,
        detail: Option<&str>,
    ) -> Result<EventType, NormalizeError> {
        match record_type {
            "Goal" => Ok(classify_goal_detail(detail)),
            "Card" => match detail {
                Some(d) if d.eq_ignore_ascii_case("Yellow Card") => Ok(EventType::YellowCard),
                Some(d)
                    if d.eq_ignore_ascii_case("Red Card")
                        || d.eq_ignore_ascii_case("Second Yellow card") =>
                {
                    Ok(EventType::RedCard)
                }
                _ => Err(NormalizeError::UnknownEventType(format!(
                    "Card/{}",
                    detail.unwrap_or("?")
                ))),
            },
            "subst" => Ok(EventType::Substitution),
            // Lineup rows come from the lineups endpoint and mark that a
            // player took the pitch without necessarily producing an event.
            "Lineup" => Ok(EventType::Appearance),
            other => Err(NormalizeError::UnknownEventType(other.to_string())),
        }
    }
}

impl VendorAdapter for ApiFootballAdapter {
    fn source_id(&self) -> &'static str {
        "api-football"
    }

    fn auth_header(&self) -> &'static str {
        "x-apisports-key"
    }

    fn page_url(&self, base_url: &str, scope: &ScopeId, offset: u32, page_size: u32) -> String {
        format!(
            "{}/events?league={}&season={}&offset={}&limit={}",
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
        let records = value
            .get("response")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or(NormalizeError::MissingField("response"))?;

        let end_of_data = match (
            value.pointer("/paging/current").and_then(|v| v.as_u64()),
            value.pointer("/paging/total").and_then(|v| v.as_u64()),
        ) {
            (Some(current), Some(total)) => current >= total,
            _ => false,
        };

        Ok(ParsedPage {
            records,
            end_of_data,
        })
    }

    fn normalize(
        &self,
        scope: &ScopeId,
        record: &JsonValue,
    ) -> Result<MatchEvent, NormalizeError> {
        let match_id = record
            .pointer("/fixture/id")
            .and_then(json_str)
            .ok_or(NormalizeError::MissingField("fixture.id"))?;
        let record_type = record
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(NormalizeError::MissingField("type"))?;
        let detail = record.get("detail").and_then(|v| v.as_str());
        let event_type = Self::map_event_type(record_type, detail)?;

        // Lineup rows carry no clock; everything else must.
        let minute = match record.pointer("/time/elapsed").and_then(json_u16) {
            Some(minute) => minute,
            None if event_type == EventType::Appearance => 0,
            None => return Err(NormalizeError::MissingField("time.elapsed")),
        };
        let minute_extra = record.pointer("/time/extra").and_then(json_u16);

        let team_id = record
            .pointer("/team/id")
            .and_then(json_str)
            .ok_or(NormalizeError::MissingField("team.id"))?;

        let player_id = record.pointer("/player/id").and_then(json_str);
        let player_name = record
            .pointer("/player/name")
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let assist_player_id = record.pointer("/assist/id").and_then(json_str);
        let assist_player_name = record
            .pointer("/assist/name")
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        let source_record_id = record
            .get("id")
            .and_then(json_str)
            .unwrap_or_else(|| format!("{}-{}-{}", match_id, minute, event_type));

        Ok(MatchEvent {
            match_id,
            scope: scope.clone(),
            minute,
            minute_extra,
            event_type,
            detail: detail.map(str::to_owned),
            team_id,
            player_id,
            player_name,
            assist_player_id,
            assist_player_name,
            source_id: self.source_id().to_string(),
            source_record_id,
            ingested_at: None,
        })
    }
}

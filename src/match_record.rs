use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One match as decoded from the provider payload.
///
/// Provider payloads differ between game modes and schema versions, so the
/// decoder never fails: every field falls back to a documented default and
/// `players` is `None` only when the player list itself is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(default)]
    pub metadata: MatchMetadata,
    #[serde(default)]
    pub players: Option<Vec<PlayerEntry>>,
    /// Keyed by lower-cased team label ("red", "blue").
    #[serde(default)]
    pub teams: HashMap<String, TeamOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub match_id: Option<String>,
    pub map: Option<String>,
    pub mode: Option<String>,
    pub started_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub puuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub stats: StatLine,
}

impl PlayerEntry {
    pub fn display_name(&self) -> String {
        if self.tag.is_empty() {
            self.name.clone()
        } else {
            format!("{}#{}", self.name, self.tag)
        }
    }

    pub fn team_label(&self) -> &str {
        self.team.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatLine {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
}

impl StatLine {
    /// `(kills + assists) / max(1, deaths)`.
    pub fn kda(&self) -> f64 {
        (self.kills as f64 + self.assists as f64) / (self.deaths.max(1) as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamOutcome {
    pub has_won: bool,
    pub rounds_won: Option<u32>,
    pub rounds_lost: Option<u32>,
}

impl MatchRecord {
    /// Decode a single provider match object.
    pub fn from_value(value: &Value) -> Self {
        let metadata = value.get("metadata").unwrap_or(&Value::Null);
        let metadata = MatchMetadata {
            match_id: pick_string(metadata, &["matchid", "match_id", "matchId"]),
            map: pick_string(metadata, &["map"]),
            mode: pick_string(metadata, &["mode", "queue"]),
            started_at: metadata.get("game_start").and_then(as_i64_any),
        };

        let players = value
            .get("players")
            .and_then(|p| p.get("all_players"))
            .and_then(|p| p.as_array())
            .map(|list| list.iter().filter_map(parse_player).collect());

        let mut teams = HashMap::new();
        if let Some(map) = value.get("teams").and_then(|t| t.as_object()) {
            for (label, team) in map {
                if let Some(outcome) = parse_team(team) {
                    teams.insert(label.to_lowercase(), outcome);
                }
            }
        }

        Self {
            metadata,
            players,
            teams,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.players.is_none()
    }

    pub fn player_list(&self) -> &[PlayerEntry] {
        self.players.as_deref().unwrap_or(&[])
    }
}

fn parse_player(value: &Value) -> Option<PlayerEntry> {
    if !value.is_object() {
        return None;
    }
    let puuid = pick_string(value, &["puuid"])?;
    if puuid.is_empty() {
        return None;
    }
    let stats = value.get("stats").unwrap_or(&Value::Null);
    Some(PlayerEntry {
        puuid,
        name: pick_string(value, &["name"]).unwrap_or_default(),
        tag: pick_string(value, &["tag"]).unwrap_or_default(),
        team: pick_string(value, &["team"]).filter(|t| !t.is_empty()),
        character: pick_string(value, &["character", "agent"]),
        stats: StatLine {
            kills: pick_u32(stats, "kills"),
            deaths: pick_u32(stats, "deaths"),
            assists: pick_u32(stats, "assists"),
            score: pick_u32(stats, "score"),
        },
    })
}

fn parse_team(value: &Value) -> Option<TeamOutcome> {
    if !value.is_object() {
        return None;
    }
    Some(TeamOutcome {
        has_won: value
            .get("has_won")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        rounds_won: value.get("rounds_won").and_then(as_u32_any),
        rounds_lost: value.get("rounds_lost").and_then(as_u32_any),
    })
}

fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::String(s)) => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn pick_u32(value: &Value, key: &str) -> u32 {
    value.get(key).and_then(as_u32_any).unwrap_or(0)
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return f.is_finite().then_some(f.trunc() as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

fn as_u32_any(v: &Value) -> Option<u32> {
    let n = as_i64_any(v)?;
    u32::try_from(n).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stats_default_to_zero_when_missing_or_garbage() {
        let raw = json!({
            "players": { "all_players": [
                { "puuid": "a", "stats": { "kills": "7", "deaths": -2, "assists": 3.0, "score": "lots" } },
                { "puuid": "b" }
            ]}
        });
        let record = MatchRecord::from_value(&raw);
        let players = record.player_list();
        assert_eq!(players.len(), 2);
        assert_eq!(
            players[0].stats,
            StatLine {
                kills: 7,
                deaths: 0,
                assists: 3,
                score: 0
            }
        );
        assert_eq!(players[1].stats, StatLine::default());
    }

    #[test]
    fn players_without_id_are_dropped() {
        let raw = json!({ "players": { "all_players": [ 42, { "name": "ghost" }, { "puuid": "" }, { "puuid": "x" } ] } });
        let record = MatchRecord::from_value(&raw);
        assert_eq!(record.player_list().len(), 1);
        assert!(!record.is_malformed());
    }

    #[test]
    fn missing_player_list_is_malformed() {
        let record = MatchRecord::from_value(&json!({ "players": { "red": [] } }));
        assert!(record.is_malformed());
        assert!(record.player_list().is_empty());
    }

    #[test]
    fn null_teams_are_absent_and_keys_lowercased() {
        let raw = json!({ "teams": { "Red": { "has_won": true, "rounds_won": 13 }, "blue": null } });
        let record = MatchRecord::from_value(&raw);
        assert_eq!(record.teams.len(), 1);
        let red = record.teams.get("red").expect("red team");
        assert!(red.has_won);
        assert_eq!(red.rounds_won, Some(13));
        assert_eq!(red.rounds_lost, None);
    }

    #[test]
    fn kda_guards_zero_deaths() {
        let line = StatLine {
            kills: 4,
            deaths: 0,
            assists: 2,
            score: 0,
        };
        assert!((line.kda() - 6.0).abs() < f64::EPSILON);
    }
}

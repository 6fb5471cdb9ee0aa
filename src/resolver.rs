use serde::{Deserialize, Serialize};

use crate::match_record::{MatchRecord, PlayerEntry, StatLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
    Unknown,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Draw => "draw",
            Outcome::Unknown => "unknown",
        }
    }

    /// Anything but a win counts against the subject; `Unknown` only when the
    /// caller says so.
    pub fn counts_as_loss(self, treat_unknown_as_loss: bool) -> bool {
        match self {
            Outcome::Win => false,
            Outcome::Loss | Outcome::Draw => true,
            Outcome::Unknown => treat_unknown_as_loss,
        }
    }
}

/// The subject's view of one match.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub subject: Option<&'a PlayerEntry>,
    pub team_label: String,
    pub outcome: Outcome,
    pub subject_stats: StatLine,
}

/// Lower-cased identity key; provider ids are not consistent in casing.
pub fn identity_key(id: &str) -> String {
    id.to_lowercase()
}

pub fn same_identity(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Provider convention: only an explicit "blue" maps to the blue entry.
pub fn team_key(label: &str) -> &'static str {
    if label.eq_ignore_ascii_case("blue") {
        "blue"
    } else {
        "red"
    }
}

pub fn resolve<'a>(record: &'a MatchRecord, subject_id: &str) -> Resolution<'a> {
    let subject = record
        .player_list()
        .iter()
        .find(|p| same_identity(&p.puuid, subject_id));

    let Some(entry) = subject else {
        return Resolution {
            subject: None,
            team_label: String::new(),
            outcome: Outcome::Unknown,
            subject_stats: StatLine::default(),
        };
    };

    let team_label = entry.team_label().to_string();
    let outcome = match record.teams.get(team_key(&team_label)) {
        None => Outcome::Unknown,
        Some(team) if team.has_won => Outcome::Win,
        Some(team) => match (team.rounds_won, team.rounds_lost) {
            (Some(won), Some(lost)) if won == lost && won > 0 => Outcome::Draw,
            _ => Outcome::Loss,
        },
    };

    Resolution {
        subject: Some(entry),
        team_label,
        outcome,
        subject_stats: entry.stats,
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DetectionConfig, MalformedPolicy};
use crate::match_record::{MatchRecord, StatLine};
use crate::resolver::{Outcome, identity_key, resolve, same_identity};

/// Accumulated interaction with one other player across the subject's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentStat {
    pub puuid: String,
    pub display_name: String,
    pub encounters: u32,
    pub as_ally: u32,
    pub as_enemy: u32,
    pub subject_losses: u32,
    // Opponent's own stat line, summed.
    pub kills: u64,
    pub deaths: u64,
    pub assists: u64,
    pub score: u64,
    // Subject's KDA in meetings as an enemy, summed.
    #[serde(skip)]
    pub subject_kda_total: f64,
}

impl OpponentStat {
    /// Share of all encounters (either side) the subject lost.
    pub fn loss_ratio(&self) -> f64 {
        if self.encounters == 0 {
            return 0.0;
        }
        self.subject_losses as f64 / self.encounters as f64
    }

    /// Subject's mean KDA over the meetings on opposite teams.
    pub fn subject_avg_kda(&self) -> f64 {
        if self.as_enemy == 0 {
            return 0.0;
        }
        self.subject_kda_total / self.as_enemy as f64
    }
}

/// The subject's own line for one match, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: String,
    pub map: String,
    pub mode: String,
    pub agent: String,
    pub result: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
}

/// Cross-match state for a single analysis run.
///
/// Opponents keep first-encounter order so that the final stable sort is
/// reproducible for identical input.
#[derive(Debug)]
pub struct InteractionAggregator {
    subject: String,
    treat_unknown_as_loss: bool,
    include_history: bool,
    malformed_policy: MalformedPolicy,
    opponents: Vec<OpponentStat>,
    index: HashMap<String, usize>,
    history: Vec<MatchSummary>,
    matches_seen: usize,
    malformed: usize,
}

/// What the aggregator hands to the classifier.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub matches_seen: usize,
    pub malformed: usize,
    pub opponents: Vec<OpponentStat>,
    pub history: Vec<MatchSummary>,
}

impl InteractionAggregator {
    pub fn new(subject: &str, cfg: &DetectionConfig) -> Self {
        Self {
            subject: subject.to_string(),
            treat_unknown_as_loss: cfg.treat_unknown_as_loss,
            include_history: cfg.include_history,
            malformed_policy: cfg.malformed_policy,
            opponents: Vec::new(),
            index: HashMap::new(),
            history: Vec::new(),
            matches_seen: 0,
            malformed: 0,
        }
    }

    pub fn ingest(&mut self, record: &MatchRecord) {
        self.matches_seen += 1;

        if record.is_malformed() {
            self.malformed += 1;
            debug!(
                match_id = record.metadata.match_id.as_deref().unwrap_or("-"),
                "match has no player list, not aggregated"
            );
            if self.include_history && self.malformed_policy == MalformedPolicy::KeepHistory {
                self.history.push(summary_for(record, None, Outcome::Unknown, StatLine::default()));
            }
            return;
        }

        let resolution = resolve(record, &self.subject);
        if self.include_history {
            let agent = resolution.subject.and_then(|p| p.character.clone());
            self.history.push(summary_for(
                record,
                agent,
                resolution.outcome,
                resolution.subject_stats,
            ));
        }
        if resolution.subject.is_none() {
            debug!(
                match_id = record.metadata.match_id.as_deref().unwrap_or("-"),
                "subject not present in match"
            );
        }

        let lost = resolution.outcome.counts_as_loss(self.treat_unknown_as_loss);
        let subject_kda = resolution.subject_stats.kda();
        let subject_team = resolution.team_label.as_str();

        for player in record.player_list() {
            if same_identity(&player.puuid, &self.subject) {
                continue;
            }
            let stat = self.entry_for(&player.puuid, player.display_name());
            stat.encounters += 1;

            let label = player.team_label();
            let ally = !label.is_empty()
                && !subject_team.is_empty()
                && same_identity(label, subject_team);
            if ally {
                stat.as_ally += 1;
            } else {
                stat.as_enemy += 1;
                stat.subject_kda_total += subject_kda;
            }
            if lost {
                stat.subject_losses += 1;
            }

            stat.kills += u64::from(player.stats.kills);
            stat.deaths += u64::from(player.stats.deaths);
            stat.assists += u64::from(player.stats.assists);
            stat.score += u64::from(player.stats.score);
        }
    }

    fn entry_for(&mut self, puuid: &str, display_name: String) -> &mut OpponentStat {
        let key = identity_key(puuid);
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                let idx = self.opponents.len();
                self.opponents.push(OpponentStat {
                    puuid: puuid.to_string(),
                    display_name,
                    ..OpponentStat::default()
                });
                self.index.insert(key, idx);
                idx
            }
        };
        &mut self.opponents[idx]
    }

    /// Consume the aggregator; opponents come back sorted by encounters, descending.
    pub fn finish(self) -> Aggregation {
        let mut opponents = self.opponents;
        opponents.sort_by(|a, b| b.encounters.cmp(&a.encounters));
        Aggregation {
            matches_seen: self.matches_seen,
            malformed: self.malformed,
            opponents,
            history: self.history,
        }
    }
}

fn summary_for(
    record: &MatchRecord,
    agent: Option<String>,
    outcome: Outcome,
    stats: StatLine,
) -> MatchSummary {
    MatchSummary {
        match_id: record.metadata.match_id.clone().unwrap_or_default(),
        map: record.metadata.map.clone().unwrap_or_default(),
        mode: record.metadata.mode.clone().unwrap_or_default(),
        agent: agent.unwrap_or_default(),
        result: outcome.as_str().to_string(),
        kills: stats.kills,
        deaths: stats.deaths,
        assists: stats.assists,
        score: stats.score,
    }
}

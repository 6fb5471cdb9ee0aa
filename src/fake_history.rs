use std::collections::HashMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::MAX_HISTORY_SIZE;
use crate::henrik::{Account, MatchProvider, ProviderError};
use crate::match_record::{MatchMetadata, MatchRecord, PlayerEntry, StatLine, TeamOutcome};

const MAPS: [&str; 7] = ["Ascent", "Bind", "Haven", "Split", "Lotus", "Sunset", "Icebox"];
const AGENTS: [&str; 10] = [
    "Jett", "Reyna", "Sage", "Omen", "Sova", "Killjoy", "Raze", "Skye", "Viper", "Clove",
];
const ROUNDS_TO_WIN: u32 = 13;

/// Shape of a generated history.
#[derive(Debug, Clone)]
pub struct FakeHistoryOptions {
    pub matches: usize,
    pub pool_size: usize,
    /// Chance that the planted opponent shows up on the enemy side.
    pub booster_rate: f64,
    /// Chance the subject loses a match the booster plays in.
    pub booster_loss_rate: f64,
    /// Every n-th match has no player list. 0 disables.
    pub malformed_every: usize,
}

impl Default for FakeHistoryOptions {
    fn default() -> Self {
        Self {
            matches: 10,
            pool_size: 40,
            booster_rate: 0.6,
            booster_loss_rate: 0.9,
            malformed_every: 0,
        }
    }
}

pub fn booster_puuid(subject: &str) -> String {
    format!("{}-booster", subject.to_lowercase())
}

/// Deterministic synthetic history for `subject`. Ten players per match, the
/// subject always included; one planted opponent tends to sit on the enemy
/// team when the subject loses.
pub fn generate_history(subject: &str, seed: u64, opts: &FakeHistoryOptions) -> Vec<MatchRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pool: Vec<String> = (0..opts.pool_size.max(9))
        .map(|i| format!("fake-{i:03}"))
        .collect();
    let booster = booster_puuid(subject);
    let start = Utc::now().timestamp() - 3_600 * opts.matches as i64;

    (0..opts.matches)
        .map(|n| {
            let mut metadata = MatchMetadata {
                match_id: Some(format!("{seed:x}-{n:04}")),
                map: Some(MAPS[rng.gen_range(0..MAPS.len())].to_string()),
                mode: Some("Competitive".to_string()),
                started_at: Some(start + 3_600 * n as i64),
            };
            if opts.malformed_every > 0 && (n + 1) % opts.malformed_every == 0 {
                metadata.mode = Some("Deathmatch".to_string());
                return MatchRecord {
                    metadata,
                    players: None,
                    teams: HashMap::new(),
                };
            }

            let booster_in = rng.gen_bool(opts.booster_rate.clamp(0.0, 1.0));
            let subject_won = if booster_in {
                !rng.gen_bool(opts.booster_loss_rate.clamp(0.0, 1.0))
            } else {
                rng.gen_bool(0.5)
            };

            let mut players = Vec::with_capacity(10);
            players.push(fake_player(&mut rng, subject, "Red"));
            let others = if booster_in { 8 } else { 9 };
            let mut picked: Vec<&String> = Vec::new();
            while picked.len() < others {
                let candidate = &pool[rng.gen_range(0..pool.len())];
                if !picked.contains(&candidate) {
                    picked.push(candidate);
                }
            }
            for (i, puuid) in picked.iter().enumerate() {
                let side = if i < 4 { "Red" } else { "Blue" };
                players.push(fake_player(&mut rng, puuid, side));
            }
            if booster_in {
                players.push(fake_player(&mut rng, &booster, "Blue"));
            }

            let loser_rounds = rng.gen_range(3..ROUNDS_TO_WIN - 1);
            let (red_rounds, blue_rounds) = if subject_won {
                (ROUNDS_TO_WIN, loser_rounds)
            } else {
                (loser_rounds, ROUNDS_TO_WIN)
            };
            let mut teams = HashMap::new();
            teams.insert("red".to_string(), team(subject_won, red_rounds, blue_rounds));
            teams.insert("blue".to_string(), team(!subject_won, blue_rounds, red_rounds));

            MatchRecord {
                metadata,
                players: Some(players),
                teams,
            }
        })
        .collect()
}

fn fake_player(rng: &mut impl Rng, puuid: &str, side: &str) -> PlayerEntry {
    let kills = rng.gen_range(2..30);
    let deaths = rng.gen_range(4..24);
    let assists = rng.gen_range(0..12);
    PlayerEntry {
        puuid: puuid.to_string(),
        name: puuid.replace('-', "_"),
        tag: "FAKE".to_string(),
        team: Some(side.to_string()),
        character: Some(AGENTS[rng.gen_range(0..AGENTS.len())].to_string()),
        stats: StatLine {
            kills,
            deaths,
            assists,
            score: kills * 200 + assists * 50 + rng.gen_range(0..400),
        },
    }
}

fn team(has_won: bool, rounds_won: u32, rounds_lost: u32) -> TeamOutcome {
    TeamOutcome {
        has_won,
        rounds_won: Some(rounds_won),
        rounds_lost: Some(rounds_lost),
    }
}

/// Offline stand-in for the HenrikDev client.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    seed: u64,
    opts: FakeHistoryOptions,
}

impl FakeProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            opts: FakeHistoryOptions::default(),
        }
    }

    pub fn with_options(mut self, opts: FakeHistoryOptions) -> Self {
        self.opts = opts;
        self
    }

    fn seed_for(&self, puuid: &str) -> u64 {
        puuid
            .to_lowercase()
            .bytes()
            .fold(self.seed, |acc, b| acc.rotate_left(5) ^ u64::from(b))
    }
}

impl MatchProvider for FakeProvider {
    fn fetch_account(&self, name: &str, tag: &str) -> Result<Account, ProviderError> {
        let (name, tag) = (name.trim(), tag.trim());
        if name.is_empty() || tag.is_empty() {
            return Err(ProviderError::NotFound);
        }
        Ok(Account {
            puuid: format!("demo-{}-{}", name.to_lowercase(), tag.to_lowercase()),
            name: name.to_string(),
            tag: tag.to_string(),
            region: Some("kr".to_string()),
            account_level: Some(100),
        })
    }

    fn fetch_match_history(
        &self,
        _region: &str,
        puuid: &str,
        size: u8,
    ) -> Result<Vec<MatchRecord>, ProviderError> {
        let opts = FakeHistoryOptions {
            matches: usize::from(size.clamp(1, MAX_HISTORY_SIZE)),
            ..self.opts.clone()
        };
        Ok(generate_history(puuid, self.seed_for(puuid), &opts))
    }
}

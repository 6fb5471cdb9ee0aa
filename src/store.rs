use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, warn};

use crate::henrik::Account;
use crate::match_record::MatchRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub connected: bool,
    pub players_count: u64,
    pub matches_count: u64,
}

/// Cache of accounts and raw match records between runs.
pub trait AccountStore {
    fn find_account(&self, name: &str, tag: &str) -> Result<Option<Account>>;
    fn save_account(&self, account: &Account) -> Result<()>;
    /// Upsert by match id; returns how many records were written.
    fn save_matches(&self, puuid: &str, matches: &[MatchRecord]) -> Result<usize>;
    /// Newest first by start time; undated matches follow in insertion order.
    fn load_matches(&self, puuid: &str) -> Result<Vec<MatchRecord>>;
    fn list_accounts(&self) -> Result<Vec<Account>>;
    fn status(&self) -> Result<StoreStatus>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS players (
            puuid TEXT PRIMARY KEY COLLATE NOCASE,
            name TEXT NOT NULL COLLATE NOCASE,
            tag TEXT NOT NULL COLLATE NOCASE,
            region TEXT NULL,
            account_level INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_riot_id ON players(name, tag);

        CREATE TABLE IF NOT EXISTS matches (
            match_id TEXT PRIMARY KEY,
            started_at INTEGER NULL,
            record_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS player_matches (
            puuid TEXT NOT NULL COLLATE NOCASE,
            match_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            PRIMARY KEY (puuid, match_id)
        );
        CREATE INDEX IF NOT EXISTS idx_player_matches_puuid ON player_matches(puuid);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl AccountStore for SqliteStore {
    fn find_account(&self, name: &str, tag: &str) -> Result<Option<Account>> {
        self.conn
            .query_row(
                "SELECT puuid, name, tag, region, account_level FROM players
                 WHERE name = ?1 AND tag = ?2
                 ORDER BY updated_at DESC LIMIT 1",
                params![name.trim(), tag.trim()],
                row_to_account,
            )
            .optional()
            .context("query account by riot id")
    }

    fn save_account(&self, account: &Account) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO players (puuid, name, tag, region, account_level, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(puuid) DO UPDATE SET
                    name = excluded.name,
                    tag = excluded.tag,
                    region = excluded.region,
                    account_level = excluded.account_level,
                    updated_at = excluded.updated_at",
                params![
                    account.puuid,
                    account.name,
                    account.tag,
                    account.region,
                    account.account_level.map(i64::from),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("upsert account")?;
        debug!(puuid = %account.puuid, "account cached");
        Ok(())
    }

    fn save_matches(&self, puuid: &str, matches: &[MatchRecord]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin match upsert")?;
        let now = Utc::now().to_rfc3339();
        let next_seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM player_matches WHERE puuid = ?1",
                params![puuid],
                |row| row.get(0),
            )
            .context("read match sequence")?;

        let mut written = 0usize;
        for record in matches {
            let Some(match_id) = record.metadata.match_id.as_deref().filter(|id| !id.is_empty())
            else {
                warn!("match without id not cached");
                continue;
            };
            let json = serde_json::to_string(record).context("serialize match record")?;
            tx.execute(
                "INSERT INTO matches (match_id, started_at, record_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(match_id) DO UPDATE SET
                    started_at = excluded.started_at,
                    record_json = excluded.record_json,
                    updated_at = excluded.updated_at",
                params![match_id, record.metadata.started_at, json, now],
            )
            .with_context(|| format!("upsert match {match_id}"))?;
            tx.execute(
                "INSERT OR IGNORE INTO player_matches (puuid, match_id, seq) VALUES (?1, ?2, ?3)",
                params![puuid, match_id, next_seq + written as i64],
            )
            .with_context(|| format!("link match {match_id}"))?;
            written += 1;
        }
        tx.commit().context("commit match upsert")?;
        Ok(written)
    }

    fn load_matches(&self, puuid: &str) -> Result<Vec<MatchRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT m.record_json FROM player_matches pm
                 JOIN matches m ON m.match_id = pm.match_id
                 WHERE pm.puuid = ?1
                 ORDER BY m.started_at IS NULL, m.started_at DESC, pm.seq ASC",
            )
            .context("prepare load matches")?;
        let rows = stmt
            .query_map(params![puuid], |row| row.get::<_, String>(0))
            .context("query matches")?;

        let mut out = Vec::new();
        for raw in rows {
            let raw = raw.context("read match row")?;
            match serde_json::from_str::<MatchRecord>(&raw) {
                Ok(record) => out.push(record),
                Err(err) => warn!(error = %err, "cached match record unreadable"),
            }
        }
        Ok(out)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut stmt = self
            .conn
            .prepare("SELECT puuid, name, tag, region, account_level FROM players ORDER BY name, tag")
            .context("prepare list accounts")?;
        let rows = stmt
            .query_map([], row_to_account)
            .context("query accounts")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read account rows")
    }

    fn status(&self) -> Result<StoreStatus> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self
                .conn
                .query_row(sql, [], |row| row.get(0))
                .with_context(|| format!("count: {sql}"))?;
            Ok(u64::try_from(n).unwrap_or(0))
        };
        Ok(StoreStatus {
            connected: true,
            players_count: count("SELECT COUNT(*) FROM players")?,
            matches_count: count("SELECT COUNT(*) FROM matches")?,
        })
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let level: Option<i64> = row.get(4)?;
    Ok(Account {
        puuid: row.get(0)?,
        name: row.get(1)?,
        tag: row.get(2)?,
        region: row.get(3)?,
        account_level: level.and_then(|n| u32::try_from(n).ok()),
    })
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use valo_abuse_terminal::analysis::analyze_many;
use valo_abuse_terminal::config::{DetectionConfig, default_db_path};
use valo_abuse_terminal::logging::init_cli_logging;
use valo_abuse_terminal::store::{AccountStore, SqliteStore};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_cli_logging();

    let db_path = parse_db_path_arg()
        .or_else(|| std::env::var("ABUSE_DB_PATH").ok().map(PathBuf::from))
        .or_else(default_db_path)
        .context("unable to resolve sqlite path")?;
    let detection = if has_flag("--legacy") {
        DetectionConfig::legacy()
    } else {
        DetectionConfig::from_env().context("invalid detection settings")?
    };
    let flagged_only = has_flag("--flagged-only");

    let store = SqliteStore::open(&db_path)?;
    let accounts = store.list_accounts()?;
    let mut jobs = Vec::with_capacity(accounts.len());
    let mut names = Vec::with_capacity(accounts.len());
    for account in &accounts {
        match store.load_matches(&account.puuid) {
            Ok(matches) if !matches.is_empty() => {
                jobs.push((account.puuid.clone(), matches));
                names.push(account.riot_id());
            }
            Ok(_) => {}
            Err(err) => warn!(puuid = %account.puuid, error = %format!("{err:#}"), "skipping account"),
        }
    }
    info!(db = %db_path.display(), accounts = accounts.len(), with_history = jobs.len(), "scanning");

    let results = analyze_many(&jobs, &detection);
    let mut flagged_accounts = 0usize;
    for ((_, report), name) in results.iter().zip(&names) {
        if report.abusing_detected {
            flagged_accounts += 1;
        } else if flagged_only {
            continue;
        }
        println!(
            "{name}: matches={} opponents={} flagged={}",
            report.matches_count,
            report.players.len(),
            report.flagged_count()
        );
        for detail in report.details.iter().take(5) {
            println!("   - {detail}");
        }
    }

    println!("Scanned {} accounts, {flagged_accounts} with findings", results.len());
    Ok(())
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}

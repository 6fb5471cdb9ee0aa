use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use valo_abuse_terminal::config::{AppConfig, DetectionConfig};
use valo_abuse_terminal::fake_history::FakeProvider;
use valo_abuse_terminal::henrik::{HenrikClient, MatchProvider};
use valo_abuse_terminal::http_client::build_http_client;
use valo_abuse_terminal::logging::init_cli_logging;
use valo_abuse_terminal::report_export::export_report;
use valo_abuse_terminal::service::AbuseService;
use valo_abuse_terminal::state::parse_riot_id;
use valo_abuse_terminal::store::SqliteStore;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_cli_logging();

    let mut app_cfg = AppConfig::from_env();
    if let Some(region) = parse_string_arg("--region") {
        app_cfg.region = region.to_ascii_lowercase();
    }
    if let Some(path) = parse_string_arg("--db") {
        app_cfg.db_path = Some(PathBuf::from(path));
    }
    if has_flag("--demo") {
        app_cfg.demo = true;
    }
    let detection = if has_flag("--legacy") {
        DetectionConfig::legacy()
    } else {
        DetectionConfig::from_env().context("invalid detection settings")?
    };

    if app_cfg.demo {
        run(FakeProvider::new(0x5eed), &app_cfg, detection)
    } else {
        let client = build_http_client()?;
        let provider = HenrikClient::from_config(client, &app_cfg);
        run(provider, &app_cfg, detection)
    }
}

fn run<P: MatchProvider>(provider: P, app_cfg: &AppConfig, detection: DetectionConfig) -> Result<()> {
    let store = match app_cfg.db_path.as_deref() {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };
    let service = AbuseService::new(provider, store, detection, app_cfg.history_size);

    let (puuid, subject, region) = if let Some(puuid) = parse_string_arg("--puuid") {
        (puuid.clone(), puuid, app_cfg.region.clone())
    } else {
        let raw = parse_string_arg("--riot-id")
            .ok_or_else(|| anyhow!("usage: analyze --riot-id name#tag | --puuid <id> [--region kr] [--cached] [--export out.xlsx] [--legacy]"))?;
        let (name, tag) =
            parse_riot_id(&raw).ok_or_else(|| anyhow!("riot id must look like name#tag"))?;
        let lookup = service.lookup_account(&name, &tag)?;
        info!(riot_id = %lookup.account.riot_id(), source = ?lookup.source, "account resolved");
        let region = if parse_string_arg("--region").is_some() {
            app_cfg.region.clone()
        } else {
            lookup
                .account
                .region
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| app_cfg.region.clone())
        };
        (
            lookup.account.puuid.clone(),
            lookup.account.riot_id(),
            region,
        )
    };

    let report = if has_flag("--cached") {
        service.analyze_cached(&puuid)?
    } else {
        service.analyze_player(&puuid, &region)?
    };

    if let Some(path) = parse_string_arg("--export") {
        let summary = export_report(Path::new(&path), &subject, &report)?;
        info!(
            path = %path,
            players = summary.players,
            history = summary.history,
            findings = summary.findings,
            "workbook written"
        );
    }

    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    println!("{json}");
    Ok(())
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}

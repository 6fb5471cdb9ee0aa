use valo_abuse_terminal::analysis::analyze;
use valo_abuse_terminal::config::DetectionConfig;
use valo_abuse_terminal::fake_history::{FakeHistoryOptions, generate_history};
use valo_abuse_terminal::henrik::Account;
use valo_abuse_terminal::service::AccountSource;
use valo_abuse_terminal::state::{AppState, Delta, ReportTab, apply_delta, parse_riot_id};
use valo_abuse_terminal::store::StoreStatus;

fn account(puuid: &str) -> Account {
    Account {
        puuid: puuid.to_string(),
        name: "Subject".to_string(),
        tag: "KR1".to_string(),
        region: Some("AP".to_string()),
        account_level: None,
    }
}

fn report_for(subject: &str) -> valo_abuse_terminal::analysis::AnalysisReport {
    let matches = generate_history(subject, 9, &FakeHistoryOptions::default());
    analyze(&matches, subject, &DetectionConfig::default())
}

#[test]
fn set_account_resets_previous_report_and_adopts_region() {
    let mut state = AppState::new();
    state.report = Some(report_for("old"));
    state.selected = 4;

    apply_delta(
        &mut state,
        Delta::SetAccount {
            account: account("new"),
            source: AccountSource::Cached,
        },
    );

    assert!(state.report.is_none());
    assert_eq!(state.selected, 0);
    assert_eq!(state.region, "ap");
    assert_eq!(state.account_source, Some(AccountSource::Cached));
    assert_eq!(state.subject_label(), "Subject#KR1");
    assert!(state.logs.back().is_some_and(|l| l.contains("from store")));
}

#[test]
fn stale_reports_are_dropped() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetAccount {
            account: account("current"),
            source: AccountSource::Provider,
        },
    );
    state.loading = true;

    apply_delta(
        &mut state,
        Delta::SetReport {
            puuid: "someone-else".to_string(),
            report: report_for("someone-else"),
        },
    );
    assert!(state.report.is_none());
    assert!(state.loading);

    apply_delta(
        &mut state,
        Delta::SetReport {
            puuid: "CURRENT".to_string(),
            report: report_for("current"),
        },
    );
    assert!(state.report.is_some());
    assert!(!state.loading);
}

#[test]
fn selection_wraps_within_active_tab() {
    let mut state = AppState::new();
    state.report = Some(report_for("me"));
    let players = state.players().len();
    assert!(players > 1);

    state.select_prev();
    assert_eq!(state.selected, players - 1);
    state.select_next();
    assert_eq!(state.selected, 0);
    assert!(state.selected_player().is_some());

    state.cycle_tab();
    assert_eq!(state.tab, ReportTab::History);
    assert_eq!(state.rows_len(), 10);
    assert!(state.selected_player().is_none());

    state.selected = 50;
    state.clamp_selection();
    assert_eq!(state.selected, 9);
}

#[test]
fn failures_clear_loading_and_record_the_error() {
    let mut state = AppState::new();
    state.loading = true;
    apply_delta(&mut state, Delta::RequestFailed("rate limited".to_string()));
    assert!(!state.loading);
    assert_eq!(state.last_error.as_deref(), Some("rate limited"));
    assert_eq!(state.logs.back().map(String::as_str), Some("[WARN] rate limited"));
}

#[test]
fn export_lifecycle_updates_status() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::ExportStarted {
            path: "out.xlsx".to_string(),
        },
    );
    assert!(state.export.active);
    assert!(!state.export.done);

    apply_delta(
        &mut state,
        Delta::ExportFinished {
            path: "out.xlsx".to_string(),
            players: 12,
            history: 10,
            findings: 1,
        },
    );
    assert!(state.export.done);
    assert!(!state.export.failed);
    assert!(state.export.message.contains("12 players"));

    let later = std::time::Instant::now() + std::time::Duration::from_secs(30);
    state.maybe_clear_export(later);
    assert!(!state.export.active);
}

#[test]
fn db_status_and_log_ring() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetDbStatus(StoreStatus {
            connected: true,
            players_count: 2,
            matches_count: 40,
        }),
    );
    assert_eq!(state.db_status.map(|s| s.matches_count), Some(40));

    for i in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
}

#[test]
fn riot_ids_need_both_halves() {
    assert_eq!(
        parse_riot_id(" Hide on bush#KR1 "),
        Some(("Hide on bush".to_string(), "KR1".to_string()))
    );
    assert_eq!(
        parse_riot_id("a#b#c"),
        Some(("a#b".to_string(), "c".to_string()))
    );
    assert_eq!(parse_riot_id("noseparator"), None);
    assert_eq!(parse_riot_id("#KR1"), None);
    assert_eq!(parse_riot_id("name# "), None);
}

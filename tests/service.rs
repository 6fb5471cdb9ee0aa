use std::cell::Cell;

use serde_json::json;

use valo_abuse_terminal::config::DetectionConfig;
use valo_abuse_terminal::henrik::{Account, MatchProvider, ProviderError};
use valo_abuse_terminal::match_record::MatchRecord;
use valo_abuse_terminal::service::{AbuseService, AccountSource, ServiceError};
use valo_abuse_terminal::store::{AccountStore, SqliteStore};

#[derive(Default)]
struct StubProvider {
    account_calls: Cell<usize>,
    requested_size: Cell<u8>,
    fail_history: bool,
}

fn losing_match(id: &str) -> MatchRecord {
    MatchRecord::from_value(&json!({
        "metadata": { "matchid": id, "map": "Split" },
        "players": { "all_players": [
            { "puuid": "p-1", "name": "Me", "tag": "KR1", "team": "Red" },
            { "puuid": "enemy", "name": "Them", "tag": "666", "team": "Blue" }
        ]},
        "teams": { "red": { "has_won": false }, "blue": { "has_won": true } }
    }))
}

impl MatchProvider for StubProvider {
    fn fetch_account(&self, name: &str, tag: &str) -> Result<Account, ProviderError> {
        self.account_calls.set(self.account_calls.get() + 1);
        if name.eq_ignore_ascii_case("missing") {
            return Err(ProviderError::NotFound);
        }
        Ok(Account {
            puuid: "p-1".to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
            region: Some("eu".to_string()),
            account_level: Some(50),
        })
    }

    fn fetch_match_history(
        &self,
        _region: &str,
        _puuid: &str,
        size: u8,
    ) -> Result<Vec<MatchRecord>, ProviderError> {
        self.requested_size.set(size);
        if self.fail_history {
            return Err(ProviderError::Status {
                status: 429,
                message: "rate limited".to_string(),
            });
        }
        Ok((0..3).map(|i| losing_match(&format!("m{i}"))).collect())
    }
}

fn service(provider: StubProvider, history_size: u8) -> AbuseService<StubProvider, SqliteStore> {
    let store = SqliteStore::open_in_memory().expect("in-memory store");
    AbuseService::new(provider, store, DetectionConfig::default(), history_size)
}

#[test]
fn lookup_hits_provider_once_then_store() {
    let svc = service(StubProvider::default(), 10);

    let first = svc.lookup_account("Me", "KR1").expect("lookup");
    assert_eq!(first.source, AccountSource::Provider);
    assert_eq!(first.account.puuid, "p-1");

    let second = svc.lookup_account(" me ", "kr1").expect("cached lookup");
    assert_eq!(second.source, AccountSource::Cached);
    assert_eq!(second.account.region.as_deref(), Some("eu"));
    assert_eq!(svc.db_status().players_count, 1);
}

#[test]
fn lookup_rejects_blank_input_and_maps_not_found() {
    let svc = service(StubProvider::default(), 10);
    assert!(matches!(
        svc.lookup_account("", "KR1"),
        Err(ServiceError::InvalidInput(_))
    ));
    assert!(matches!(
        svc.lookup_account("Me", "  "),
        Err(ServiceError::InvalidInput(_))
    ));
    assert!(matches!(
        svc.lookup_account("missing", "KR1"),
        Err(ServiceError::NotFound)
    ));
}

#[test]
fn analyze_player_caches_history_and_clamps_size() {
    let svc = service(StubProvider::default(), 99);
    let report = svc.analyze_player("p-1", "eu").expect("analysis");
    assert_eq!(svc.provider().requested_size.get(), 20);
    assert_eq!(report.matches_count, 3);
    assert!(report.abusing_detected);
    assert_eq!(report.findings[0].puuid, "enemy");

    let status = svc.db_status();
    assert!(status.connected);
    assert_eq!(status.matches_count, 3);

    let cached = svc.analyze_cached("p-1").expect("cached analysis");
    assert_eq!(cached, report);
    assert_eq!(svc.store().load_matches("p-1").expect("load").len(), 3);
}

#[test]
fn provider_failures_surface_as_provider_errors() {
    let svc = service(
        StubProvider {
            fail_history: true,
            ..StubProvider::default()
        },
        5,
    );
    match svc.analyze_player("p-1", "eu") {
        Err(ServiceError::Provider(ProviderError::Status { status, .. })) => assert_eq!(status, 429),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        svc.analyze_player(" ", "eu"),
        Err(ServiceError::InvalidInput(_))
    ));
    let empty = svc.analyze_cached("p-1").expect("empty cache is fine");
    assert_eq!(empty.matches_count, 0);
}

#[test]
fn ping_answers() {
    let svc = service(StubProvider::default(), 10);
    assert_eq!(svc.ping(), "pong");
}

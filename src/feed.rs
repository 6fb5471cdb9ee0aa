use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use crate::henrik::MatchProvider;
use crate::report_export;
use crate::service::{AbuseService, ServiceError};
use crate::state::{Delta, ProviderCommand};
use crate::store::AccountStore;

/// Run the service on a background thread, answering commands with deltas.
///
/// A lookup that succeeds goes straight on to a fresh analysis. When the
/// provider is unavailable the worker falls back to whatever the store holds.
pub fn spawn_provider<P, S>(
    service: AbuseService<P, S>,
    default_region: String,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> thread::JoinHandle<()>
where
    P: MatchProvider + Send + 'static,
    S: AccountStore + Send + 'static,
{
    thread::spawn(move || {
        let _ = tx.send(Delta::SetDbStatus(service.db_status()));
        let _ = tx.send(Delta::Log(format!(
            "[INFO] Provider ready ({})",
            service.ping()
        )));

        for cmd in cmd_rx {
            match cmd {
                ProviderCommand::Lookup { name, tag } => {
                    match service.lookup_account(&name, &tag) {
                        Ok(lookup) => {
                            let puuid = lookup.account.puuid.clone();
                            let region = lookup
                                .account
                                .region
                                .clone()
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| default_region.clone());
                            let _ = tx.send(Delta::SetAccount {
                                account: lookup.account,
                                source: lookup.source,
                            });
                            run_analysis(&service, &puuid, &region, &tx);
                        }
                        Err(ServiceError::NotFound) => {
                            let _ = tx.send(Delta::RequestFailed(format!(
                                "No account named {name}#{tag}"
                            )));
                        }
                        Err(err) => {
                            let _ = tx.send(Delta::RequestFailed(format!("Lookup failed: {err}")));
                        }
                    }
                }
                ProviderCommand::Analyze { puuid, region } => {
                    run_analysis(&service, &puuid, &region, &tx);
                }
                ProviderCommand::AnalyzeCached { puuid } => match service.analyze_cached(&puuid) {
                    Ok(report) => {
                        let _ = tx.send(Delta::SetReport { puuid, report });
                    }
                    Err(err) => {
                        let _ = tx.send(Delta::RequestFailed(format!(
                            "Cached analysis failed: {err}"
                        )));
                    }
                },
                ProviderCommand::Export {
                    path,
                    subject,
                    report,
                } => {
                    let tx = tx.clone();
                    thread::spawn(move || {
                        let _ = tx.send(Delta::ExportStarted { path: path.clone() });
                        match report_export::export_report(Path::new(&path), &subject, &report) {
                            Ok(summary) => {
                                let _ = tx.send(Delta::ExportFinished {
                                    path,
                                    players: summary.players,
                                    history: summary.history,
                                    findings: summary.findings,
                                });
                            }
                            Err(err) => {
                                let _ = tx.send(Delta::ExportFailed {
                                    path,
                                    error: format!("{err:#}"),
                                });
                            }
                        }
                    });
                }
                ProviderCommand::RefreshStatus => {
                    let _ = tx.send(Delta::SetDbStatus(service.db_status()));
                }
            }
        }
    })
}

fn run_analysis<P: MatchProvider, S: AccountStore>(
    service: &AbuseService<P, S>,
    puuid: &str,
    region: &str,
    tx: &Sender<Delta>,
) {
    match service.analyze_player(puuid, region) {
        Ok(report) => {
            let _ = tx.send(Delta::SetReport {
                puuid: puuid.to_string(),
                report,
            });
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!(
                "[WARN] Match history fetch failed: {err}; using cached matches"
            )));
            match service.analyze_cached(puuid) {
                Ok(report) if report.matches_count > 0 => {
                    let _ = tx.send(Delta::SetReport {
                        puuid: puuid.to_string(),
                        report,
                    });
                }
                Ok(_) => {
                    let _ = tx.send(Delta::RequestFailed(format!(
                        "No match history available: {err}"
                    )));
                }
                Err(cache_err) => {
                    let _ = tx.send(Delta::RequestFailed(format!(
                        "Analysis failed: {err}; cache: {cache_err}"
                    )));
                }
            }
        }
    }
    let _ = tx.send(Delta::SetDbStatus(service.db_status()));
}

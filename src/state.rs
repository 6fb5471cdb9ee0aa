use std::collections::VecDeque;
use std::time::Instant;

use crate::aggregator::{MatchSummary, OpponentStat};
use crate::analysis::AnalysisReport;
use crate::classifier::Finding;
use crate::henrik::Account;
use crate::service::AccountSource;
use crate::store::StoreStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTab {
    Players,
    History,
    Findings,
}

impl ReportTab {
    pub fn label(self) -> &'static str {
        match self {
            ReportTab::Players => "Players",
            ReportTab::History => "History",
            ReportTab::Findings => "Findings",
        }
    }

    pub fn all() -> [ReportTab; 3] {
        [ReportTab::Players, ReportTab::History, ReportTab::Findings]
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub tab: ReportTab,
    pub selected: usize,
    pub input: String,
    pub input_active: bool,
    pub region: String,
    pub account: Option<Account>,
    pub account_source: Option<AccountSource>,
    pub report: Option<AnalysisReport>,
    pub loading: bool,
    pub last_error: Option<String>,
    pub db_status: Option<StoreStatus>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub export: ExportState,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            tab: ReportTab::Players,
            selected: 0,
            input: String::new(),
            input_active: true,
            region: crate::config::DEFAULT_REGION.to_string(),
            account: None,
            account_source: None,
            report: None,
            loading: false,
            last_error: None,
            db_status: None,
            logs: VecDeque::new(),
            help_overlay: false,
            export: ExportState::new(),
        }
    }

    pub fn maybe_clear_export(&mut self, now: Instant) {
        self.export.clear_if_done_for(now, 8);
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn cycle_tab(&mut self) {
        self.tab = match self.tab {
            ReportTab::Players => ReportTab::History,
            ReportTab::History => ReportTab::Findings,
            ReportTab::Findings => ReportTab::Players,
        };
        self.selected = 0;
    }

    pub fn rows_len(&self) -> usize {
        let Some(report) = self.report.as_ref() else {
            return 0;
        };
        match self.tab {
            ReportTab::Players => report.players.len(),
            ReportTab::History => report.history.len(),
            ReportTab::Findings => report.findings.len(),
        }
    }

    pub fn select_next(&mut self) {
        let total = self.rows_len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1) % total;
    }

    pub fn select_prev(&mut self) {
        let total = self.rows_len();
        if total == 0 {
            self.selected = 0;
            return;
        }
        if self.selected == 0 {
            self.selected = total - 1;
        } else {
            self.selected -= 1;
        }
    }

    pub fn clamp_selection(&mut self) {
        let total = self.rows_len();
        if total == 0 {
            self.selected = 0;
        } else if self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn players(&self) -> &[OpponentStat] {
        self.report.as_ref().map(|r| r.players.as_slice()).unwrap_or(&[])
    }

    pub fn history(&self) -> &[MatchSummary] {
        self.report.as_ref().map(|r| r.history.as_slice()).unwrap_or(&[])
    }

    pub fn findings(&self) -> &[Finding] {
        self.report.as_ref().map(|r| r.findings.as_slice()).unwrap_or(&[])
    }

    pub fn selected_player(&self) -> Option<&OpponentStat> {
        match self.tab {
            ReportTab::Players => self.players().get(self.selected),
            ReportTab::Findings => {
                let finding = self.findings().get(self.selected)?;
                self.players().iter().find(|p| p.puuid == finding.puuid)
            }
            ReportTab::History => None,
        }
    }

    pub fn subject_label(&self) -> String {
        self.account
            .as_ref()
            .map(|a| a.riot_id())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Split `name#tag`. Both halves must be non-empty after trimming.
pub fn parse_riot_id(raw: &str) -> Option<(String, String)> {
    let (name, tag) = raw.trim().rsplit_once('#')?;
    let (name, tag) = (name.trim(), tag.trim());
    if name.is_empty() || tag.is_empty() {
        return None;
    }
    Some((name.to_string(), tag.to_string()))
}

#[derive(Debug, Clone)]
pub struct ExportState {
    pub active: bool,
    pub done: bool,
    pub path: Option<String>,
    pub message: String,
    pub failed: bool,
    pub last_updated: Option<Instant>,
}

impl Default for ExportState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportState {
    pub fn new() -> Self {
        Self {
            active: false,
            done: false,
            path: None,
            message: String::new(),
            failed: false,
            last_updated: None,
        }
    }

    pub fn clear_if_done_for(&mut self, now: Instant, keep_secs: u64) {
        if !self.active || !self.done {
            return;
        }
        let Some(last) = self.last_updated else {
            return;
        };
        if now.duration_since(last).as_secs() >= keep_secs {
            *self = Self::new();
        }
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetAccount {
        account: Account,
        source: AccountSource,
    },
    SetReport {
        puuid: String,
        report: AnalysisReport,
    },
    SetDbStatus(StoreStatus),
    RequestFailed(String),
    ExportStarted {
        path: String,
    },
    ExportFinished {
        path: String,
        players: usize,
        history: usize,
        findings: usize,
    },
    ExportFailed {
        path: String,
        error: String,
    },
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Lookup { name: String, tag: String },
    Analyze { puuid: String, region: String },
    AnalyzeCached { puuid: String },
    Export {
        path: String,
        subject: String,
        report: Box<AnalysisReport>,
    },
    RefreshStatus,
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetAccount { account, source } => {
            let origin = match source {
                AccountSource::Cached => "store",
                AccountSource::Provider => "provider",
            };
            state.push_log(format!("[INFO] {} resolved from {origin}", account.riot_id()));
            if let Some(region) = account.region.as_deref().filter(|r| !r.is_empty()) {
                state.region = region.to_ascii_lowercase();
            }
            state.account = Some(account);
            state.account_source = Some(source);
            state.report = None;
            state.last_error = None;
            state.selected = 0;
        }
        Delta::SetReport { puuid, report } => {
            // A late report for a previous lookup is dropped.
            let current = state.account.as_ref().map(|a| a.puuid.as_str());
            if current.is_some_and(|id| !crate::resolver::same_identity(id, &puuid)) {
                state.push_log(format!("[WARN] Dropped stale report for {puuid}"));
                return;
            }
            state.push_log(format!(
                "[INFO] Analysed {} matches, {} opponents, {} flagged",
                report.matches_count,
                report.players.len(),
                report.flagged_count()
            ));
            state.report = Some(report);
            state.loading = false;
            state.last_error = None;
            state.clamp_selection();
        }
        Delta::SetDbStatus(status) => {
            state.db_status = Some(status);
        }
        Delta::RequestFailed(msg) => {
            state.push_log(format!("[WARN] {msg}"));
            state.loading = false;
            state.last_error = Some(msg);
        }
        Delta::ExportStarted { path } => {
            state.export = ExportState::new();
            state.export.active = true;
            state.export.path = Some(path);
            state.export.message = "Writing workbook".to_string();
            state.export.last_updated = Some(Instant::now());
        }
        Delta::ExportFinished {
            path,
            players,
            history,
            findings,
        } => {
            state.export.active = true;
            state.export.done = true;
            state.export.message =
                format!("Done: {players} players, {history} matches, {findings} findings");
            state.export.last_updated = Some(Instant::now());
            state.push_log(format!("[INFO] Export written to {path}"));
            state.export.path = Some(path);
        }
        Delta::ExportFailed { path, error } => {
            state.export.active = true;
            state.export.done = true;
            state.export.failed = true;
            state.export.message = format!("Failed: {error}");
            state.export.last_updated = Some(Instant::now());
            state.push_log(format!("[WARN] Export to {path} failed: {error}"));
            state.export.path = Some(path);
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use valo_abuse_terminal::config::{AppConfig, DetectionConfig};
use valo_abuse_terminal::fake_history::FakeProvider;
use valo_abuse_terminal::feed;
use valo_abuse_terminal::henrik::{HenrikClient, MatchProvider};
use valo_abuse_terminal::http_client::build_http_client;
use valo_abuse_terminal::service::{AbuseService, AccountSource};
use valo_abuse_terminal::state::{
    AppState, Delta, ProviderCommand, ReportTab, apply_delta, parse_riot_id,
};
use valo_abuse_terminal::store::SqliteStore;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>, region: String) -> Self {
        let mut state = AppState::new();
        state.region = region;
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.input_active {
            self.on_input_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') | KeyCode::Char('i') => self.state.input_active = true,
            KeyCode::Tab => self.state.cycle_tab(),
            KeyCode::Char('1') => self.set_tab(ReportTab::Players),
            KeyCode::Char('2') => self.set_tab(ReportTab::History),
            KeyCode::Char('3') => self.set_tab(ReportTab::Findings),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('r') => self.request_refresh(false),
            KeyCode::Char('c') => self.request_refresh(true),
            KeyCode::Char('e') => self.request_export(),
            KeyCode::Char('s') => self.send(ProviderCommand::RefreshStatus, None),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            _ => {}
        }
    }

    fn on_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_lookup(),
            KeyCode::Esc => self.state.input_active = false,
            KeyCode::Backspace => {
                self.state.input.pop();
            }
            KeyCode::Char(c) => self.state.input.push(c),
            _ => {}
        }
    }

    fn set_tab(&mut self, tab: ReportTab) {
        self.state.tab = tab;
        self.state.selected = 0;
    }

    fn submit_lookup(&mut self) {
        let Some((name, tag)) = parse_riot_id(&self.state.input) else {
            self.state.push_log("[WARN] Enter a Riot id as name#tag");
            return;
        };
        self.state.input_active = false;
        self.state.loading = true;
        self.send(
            ProviderCommand::Lookup { name, tag },
            Some("[INFO] Lookup request sent"),
        );
    }

    fn request_refresh(&mut self, cached_only: bool) {
        let Some(account) = self.state.account.as_ref() else {
            self.state.push_log("[INFO] No player selected yet");
            return;
        };
        let puuid = account.puuid.clone();
        let cmd = if cached_only {
            ProviderCommand::AnalyzeCached { puuid }
        } else {
            ProviderCommand::Analyze {
                puuid,
                region: self.state.region.clone(),
            }
        };
        self.state.loading = true;
        self.send(cmd, Some("[INFO] Analysis request sent"));
    }

    fn request_export(&mut self) {
        let Some(report) = self.state.report.clone() else {
            self.state.push_log("[INFO] Nothing to export yet");
            return;
        };
        let subject = self.state.subject_label();
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let slug: String = subject
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = format!("abuse_report_{slug}_{stamp}.xlsx");
        self.send(
            ProviderCommand::Export {
                path,
                subject,
                report: Box::new(report),
            },
            None,
        );
    }

    fn send(&mut self, cmd: ProviderCommand, announce: Option<&str>) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[INFO] Provider unavailable");
            self.state.loading = false;
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider request failed");
            self.state.loading = false;
        } else if let Some(msg) = announce {
            self.state.push_log(msg);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let app_cfg = AppConfig::from_env();
    let detection = DetectionConfig::from_env().context("invalid detection settings")?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();

    if app_cfg.demo {
        let _ = tx.send(Delta::Log("[INFO] Demo mode: synthetic match history".to_string()));
        start_provider(FakeProvider::new(0x5eed), &app_cfg, detection, tx, cmd_rx);
    } else {
        let client = build_http_client()?;
        if app_cfg.api_key.is_none() {
            let _ = tx.send(Delta::Log(
                "[WARN] HENRIK_API_KEY not set; requests may be rejected".to_string(),
            ));
        }
        let provider = HenrikClient::from_config(client, &app_cfg);
        start_provider(provider, &app_cfg, detection, tx, cmd_rx);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(Some(cmd_tx), app_cfg.region.clone());
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn start_provider<P>(
    provider: P,
    app_cfg: &AppConfig,
    detection: DetectionConfig,
    tx: mpsc::Sender<Delta>,
    cmd_rx: mpsc::Receiver<ProviderCommand>,
) where
    P: MatchProvider + Send + 'static,
{
    let store = match app_cfg.db_path.as_deref().map(SqliteStore::open) {
        Some(Ok(store)) => store,
        Some(Err(err)) => {
            let _ = tx.send(Delta::Log(format!(
                "[WARN] Store unavailable ({err:#}); using memory"
            )));
            match SqliteStore::open_in_memory() {
                Ok(store) => store,
                Err(err) => {
                    let _ = tx.send(Delta::Log(format!("[WARN] No store: {err:#}")));
                    return;
                }
            }
        }
        None => match SqliteStore::open_in_memory() {
            Ok(store) => store,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] No store: {err:#}")));
                return;
            }
        },
    };
    let service = AbuseService::new(provider, store, detection, app_cfg.history_size);
    feed::spawn_provider(service, app_cfg.region.clone(), tx, cmd_rx);
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        app.state.maybe_clear_export(Instant::now());

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_input(frame, chunks[1], &app.state);
    render_report(frame, chunks[2], &app.state);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[4]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let source = match state.account_source {
        Some(AccountSource::Cached) => " (cached)",
        Some(AccountSource::Provider) => "",
        None => "",
    };
    let db = match state.db_status {
        Some(status) if status.connected => format!(
            "DB {} players / {} matches",
            status.players_count, status.matches_count
        ),
        Some(_) => "DB offline".to_string(),
        None => "DB ...".to_string(),
    };
    let verdict = match state.report.as_ref() {
        _ if state.loading => "analysing...".to_string(),
        Some(report) if report.abusing_detected => {
            format!("ABUSE SUSPECTED ({} flagged)", report.flagged_count())
        }
        Some(report) => format!("clean over {} matches", report.matches_count),
        None => "no report".to_string(),
    };
    let line1 = format!(
        " VALO ABUSE | {}{source} | region {} | {verdict}",
        state.subject_label(),
        state.region
    );
    let line2 = format!(" {db}");
    let line3 = state
        .last_error
        .as_ref()
        .map(|e| format!(" ! {e}"))
        .unwrap_or_default();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    if state.input_active {
        "Enter Lookup | Esc Cancel".to_string()
    } else {
        "/ Search | Tab/1-3 Tabs | j/k Move | r Refresh | c Cached | e Export | ? Help | q Quit"
            .to_string()
    }
}

fn render_input(frame: &mut Frame, area: Rect, state: &AppState) {
    let style = if state.input_active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let cursor = if state.input_active { "_" } else { "" };
    let input = Paragraph::new(format!("{}{cursor}", state.input))
        .style(style)
        .block(Block::default().title("Riot ID (name#tag)").borders(Borders::ALL));
    frame.render_widget(input, area);
}

fn render_report(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(area);

    let titles: Vec<String> = ReportTab::all()
        .iter()
        .map(|tab| {
            if *tab == state.tab {
                format!("[{}]", tab.label())
            } else {
                tab.label().to_string()
            }
        })
        .collect();
    let block = Block::default()
        .title(titles.join(" "))
        .borders(Borders::ALL);
    let visible = columns[0].height.saturating_sub(3) as usize;

    let (header, rows) = match state.tab {
        ReportTab::Players => players_lines(state),
        ReportTab::History => history_lines(state),
        ReportTab::Findings => findings_lines(state),
    };
    let (start, end) = visible_range(state.selected, rows.len(), visible);
    let mut lines = vec![Line::from(Span::styled(
        header,
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for (idx, (text, flagged)) in rows.into_iter().enumerate().skip(start).take(end - start) {
        let mut style = Style::default();
        if flagged {
            style = style.fg(Color::Red);
        }
        if idx == state.selected {
            style = style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(Span::styled(text, style)));
    }
    if lines.len() == 1 {
        lines.push(Line::from("  (empty)"));
    }
    frame.render_widget(Paragraph::new(lines).block(block), columns[0]);

    let detail = Paragraph::new(detail_text(state))
        .block(Block::default().title("Detail").borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(detail, columns[1]);
}

fn players_lines(state: &AppState) -> (String, Vec<(String, bool)>) {
    let header = format!(
        "{:<24} {:>4} {:>4} {:>4} {:>5} {:>6}",
        "Player", "Met", "Ally", "Enmy", "Lost", "Ratio"
    );
    let rows = state
        .players()
        .iter()
        .map(|p| {
            let flagged = state
                .report
                .as_ref()
                .is_some_and(|r| r.is_flagged(&p.puuid));
            (
                format!(
                    "{:<24} {:>4} {:>4} {:>4} {:>5} {:>5.0}%",
                    truncate(&p.display_name, 24),
                    p.encounters,
                    p.as_ally,
                    p.as_enemy,
                    p.subject_losses,
                    p.loss_ratio() * 100.0
                ),
                flagged,
            )
        })
        .collect();
    (header, rows)
}

fn history_lines(state: &AppState) -> (String, Vec<(String, bool)>) {
    let header = format!(
        "{:<10} {:<12} {:<10} {:<7} {:>9}",
        "Map", "Mode", "Agent", "Result", "K/D/A"
    );
    let rows = state
        .history()
        .iter()
        .map(|m| {
            (
                format!(
                    "{:<10} {:<12} {:<10} {:<7} {:>9}",
                    truncate(&m.map, 10),
                    truncate(&m.mode, 12),
                    truncate(&m.agent, 10),
                    m.result,
                    format!("{}/{}/{}", m.kills, m.deaths, m.assists)
                ),
                m.result == "loss",
            )
        })
        .collect();
    (header, rows)
}

fn findings_lines(state: &AppState) -> (String, Vec<(String, bool)>) {
    let header = format!("{:<24} {:>4} {:>4} {:>6}", "Player", "Enmy", "Lost", "Ratio");
    let rows = state
        .findings()
        .iter()
        .map(|f| {
            (
                format!(
                    "{:<24} {:>4} {:>4} {:>5.0}%",
                    truncate(&f.display_name, 24),
                    f.as_enemy,
                    f.subject_losses,
                    f.loss_ratio * 100.0
                ),
                true,
            )
        })
        .collect();
    (header, rows)
}

fn detail_text(state: &AppState) -> String {
    if state.tab == ReportTab::Findings
        && let Some(finding) = state.findings().get(state.selected)
    {
        return finding.detail.clone();
    }
    if state.tab == ReportTab::History
        && let Some(row) = state.history().get(state.selected)
    {
        return format!(
            "Match {}\nMap: {}\nMode: {}\nAgent: {}\nResult: {}\nScore: {}",
            row.match_id, row.map, row.mode, row.agent, row.result, row.score
        );
    }
    let Some(player) = state.selected_player() else {
        return export_text(state).unwrap_or_else(|| "Nothing selected".to_string());
    };
    let mut text = format!(
        "{}\n{}\n\nMet {} times ({} ally, {} enemy)\nSubject lost {} ({:.0}%)\nTheir K/D/A: {}/{}/{}\nTheir score: {}",
        player.display_name,
        player.puuid,
        player.encounters,
        player.as_ally,
        player.as_enemy,
        player.subject_losses,
        player.loss_ratio() * 100.0,
        player.kills,
        player.deaths,
        player.assists,
        player.score
    );
    if let Some(export) = export_text(state) {
        text.push_str("\n\n");
        text.push_str(&export);
    }
    text
}

fn export_text(state: &AppState) -> Option<String> {
    if !state.export.active {
        return None;
    }
    let path = state.export.path.as_deref().unwrap_or("-");
    Some(format!("Export {path}\n{}", state.export.message))
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(4)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn truncate(raw: &str, width: usize) -> String {
    if raw.chars().count() <= width {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Valo Abuse Terminal - Help",
        "",
        "Search:",
        "  / or i       Edit Riot id",
        "  Enter        Look up and analyse",
        "  Esc          Leave input",
        "",
        "Report:",
        "  Tab / 1-3    Players, History, Findings",
        "  j/k or ↑/↓   Move",
        "  r            Refetch history",
        "  c            Analyse cached matches only",
        "  e            Export workbook (.xlsx)",
        "  s            Refresh store status",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

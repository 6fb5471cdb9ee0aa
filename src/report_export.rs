use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::aggregator::{MatchSummary, OpponentStat};
use crate::analysis::AnalysisReport;
use crate::classifier::Finding;

pub struct ExportSummary {
    pub players: usize,
    pub history: usize,
    pub findings: usize,
}

/// Write the report as a workbook with Summary, Players, History and Findings sheets.
pub fn export_report(path: &Path, subject: &str, report: &AnalysisReport) -> Result<ExportSummary> {
    let summary_rows = vec![
        vec!["Field".to_string(), "Value".to_string()],
        vec!["Subject".to_string(), subject.to_string()],
        vec!["Matches".to_string(), report.matches_count.to_string()],
        vec![
            "Abusing Detected".to_string(),
            report.abusing_detected.to_string(),
        ],
        vec!["Flagged".to_string(), report.flagged_count().to_string()],
    ];

    let mut players_rows = vec![vec![
        "PUUID".to_string(),
        "Player".to_string(),
        "Encounters".to_string(),
        "As Ally".to_string(),
        "As Enemy".to_string(),
        "Subject Losses".to_string(),
        "Loss Ratio".to_string(),
        "Kills".to_string(),
        "Deaths".to_string(),
        "Assists".to_string(),
        "Score".to_string(),
        "Flagged".to_string(),
    ]];
    players_rows.extend(
        report
            .players
            .iter()
            .map(|stat| player_row(stat, report.is_flagged(&stat.puuid))),
    );

    let mut history_rows = vec![vec![
        "Match ID".to_string(),
        "Map".to_string(),
        "Mode".to_string(),
        "Agent".to_string(),
        "Result".to_string(),
        "K".to_string(),
        "D".to_string(),
        "A".to_string(),
        "Score".to_string(),
    ]];
    history_rows.extend(report.history.iter().map(history_row));

    let mut findings_rows = vec![vec![
        "PUUID".to_string(),
        "Player".to_string(),
        "Encounters".to_string(),
        "As Enemy".to_string(),
        "Subject Losses".to_string(),
        "Loss Ratio".to_string(),
        "Detail".to_string(),
    ]];
    findings_rows.extend(report.findings.iter().map(finding_row));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Players")?;
        write_rows(sheet, &players_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("History")?;
        write_rows(sheet, &history_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Findings")?;
        write_rows(sheet, &findings_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        players: players_rows.len().saturating_sub(1),
        history: history_rows.len().saturating_sub(1),
        findings: findings_rows.len().saturating_sub(1),
    })
}

fn player_row(stat: &OpponentStat, flagged: bool) -> Vec<String> {
    vec![
        stat.puuid.clone(),
        stat.display_name.clone(),
        stat.encounters.to_string(),
        stat.as_ally.to_string(),
        stat.as_enemy.to_string(),
        stat.subject_losses.to_string(),
        format!("{:.2}", stat.loss_ratio()),
        stat.kills.to_string(),
        stat.deaths.to_string(),
        stat.assists.to_string(),
        stat.score.to_string(),
        if flagged { "yes" } else { "" }.to_string(),
    ]
}

fn history_row(row: &MatchSummary) -> Vec<String> {
    vec![
        row.match_id.clone(),
        row.map.clone(),
        row.mode.clone(),
        row.agent.clone(),
        row.result.clone(),
        row.kills.to_string(),
        row.deaths.to_string(),
        row.assists.to_string(),
        row.score.to_string(),
    ]
}

fn finding_row(finding: &Finding) -> Vec<String> {
    vec![
        finding.puuid.clone(),
        finding.display_name.clone(),
        finding.encounters.to_string(),
        finding.as_enemy.to_string(),
        finding.subject_losses.to_string(),
        format!("{:.2}", finding.loss_ratio),
        finding.detail.clone(),
    ]
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

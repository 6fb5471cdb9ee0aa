use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::{InteractionAggregator, MatchSummary, OpponentStat};
use crate::classifier::{Finding, classify};
use crate::config::DetectionConfig;
use crate::match_record::MatchRecord;

/// Result of one analysis run. Every list serializes as an array, never null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub matches_count: usize,
    pub abusing_detected: bool,
    pub details: Vec<String>,
    pub players: Vec<OpponentStat>,
    pub history: Vec<MatchSummary>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl AnalysisReport {
    pub fn flagged_count(&self) -> usize {
        self.findings.len()
    }

    pub fn is_flagged(&self, puuid: &str) -> bool {
        self.findings
            .iter()
            .any(|f| crate::resolver::same_identity(&f.puuid, puuid))
    }
}

/// Aggregate and classify one subject's match history. Pure and stateless.
pub fn analyze(matches: &[MatchRecord], subject: &str, cfg: &DetectionConfig) -> AnalysisReport {
    let mut aggregator = InteractionAggregator::new(subject, cfg);
    for record in matches {
        aggregator.ingest(record);
    }
    let aggregation = aggregator.finish();
    let findings = classify(&aggregation.opponents, aggregation.matches_seen, cfg);

    debug!(
        subject,
        matches = aggregation.matches_seen,
        malformed = aggregation.malformed,
        opponents = aggregation.opponents.len(),
        flagged = findings.len(),
        "analysis finished"
    );

    AnalysisReport {
        matches_count: aggregation.matches_seen,
        abusing_detected: !findings.is_empty(),
        details: findings.iter().map(|f| f.detail.clone()).collect(),
        players: aggregation.opponents,
        history: aggregation.history,
        findings,
    }
}

/// Run independent analyses in parallel, preserving input order.
pub fn analyze_many(
    jobs: &[(String, Vec<MatchRecord>)],
    cfg: &DetectionConfig,
) -> Vec<(String, AnalysisReport)> {
    jobs.par_iter()
        .map(|(subject, matches)| (subject.clone(), analyze(matches, subject, cfg)))
        .collect()
}

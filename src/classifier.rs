use serde::{Deserialize, Serialize};

use crate::aggregator::OpponentStat;
use crate::config::{DetectionConfig, SideMode};

/// An opponent whose tallies crossed the configured thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub puuid: String,
    pub display_name: String,
    pub encounters: u32,
    pub as_enemy: u32,
    pub subject_losses: u32,
    pub loss_ratio: f64,
    pub detail: String,
}

/// Classify final tallies. `matches_seen` gates the optional minimum sample.
pub fn classify(
    opponents: &[OpponentStat],
    matches_seen: usize,
    cfg: &DetectionConfig,
) -> Vec<Finding> {
    if matches_seen < cfg.min_matches {
        return Vec::new();
    }
    opponents
        .iter()
        .filter_map(|stat| evaluate(stat, cfg))
        .collect()
}

pub fn is_flagged(stat: &OpponentStat, cfg: &DetectionConfig) -> bool {
    evaluate(stat, cfg).is_some()
}

fn side_count(stat: &OpponentStat, mode: SideMode) -> u32 {
    match mode {
        SideMode::Split => stat.as_enemy,
        SideMode::IgnoreSide => stat.encounters,
    }
}

fn evaluate(stat: &OpponentStat, cfg: &DetectionConfig) -> Option<Finding> {
    if side_count(stat, cfg.side_mode) < cfg.enemy_threshold {
        return None;
    }

    let ratio = stat.loss_ratio();
    let mut reasons = Vec::new();
    if ratio >= cfg.loss_ratio_threshold {
        reasons.push(format!(
            "subject lost {:.0}% of them (threshold {:.0}%)",
            ratio * 100.0,
            cfg.loss_ratio_threshold * 100.0
        ));
    }
    if let Some(limit) = cfg.max_subject_kda {
        let kda = stat.subject_avg_kda();
        if kda <= limit {
            reasons.push(format!(
                "subject averaged {kda:.2} KDA against them (limit {limit:.2})"
            ));
        }
    }
    if reasons.is_empty() {
        return None;
    }

    let side = match cfg.side_mode {
        SideMode::Split => format!("{} as enemy", stat.as_enemy),
        SideMode::IgnoreSide => format!("{} ally / {} enemy", stat.as_ally, stat.as_enemy),
    };
    let name = if stat.display_name.is_empty() {
        stat.puuid.clone()
    } else {
        format!("{} ({})", stat.display_name, stat.puuid)
    };
    let detail = format!(
        "opponent {name}: met {} times ({side}), lost {}; {} - possible deliberate losses",
        stat.encounters,
        stat.subject_losses,
        reasons.join("; ")
    );

    Some(Finding {
        puuid: stat.puuid.clone(),
        display_name: stat.display_name.clone(),
        encounters: stat.encounters,
        as_enemy: stat.as_enemy,
        subject_losses: stat.subject_losses,
        loss_ratio: ratio,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(encounters: u32, as_enemy: u32, losses: u32) -> OpponentStat {
        OpponentStat {
            puuid: "opp".to_string(),
            display_name: "Opp#KR1".to_string(),
            encounters,
            as_ally: encounters - as_enemy,
            as_enemy,
            subject_losses: losses,
            ..OpponentStat::default()
        }
    }

    #[test]
    fn ratio_divides_by_total_encounters() {
        let cfg = DetectionConfig::default();
        // 3 enemy meetings, 4 total, 3 lost: 0.75 hits the default exactly.
        assert!(is_flagged(&stat(4, 3, 3), &cfg));
        // Same enemy count but 5 total drops the ratio to 0.6.
        assert!(!is_flagged(&stat(5, 3, 3), &cfg));
    }

    #[test]
    fn enemy_gate_ignores_ally_meetings() {
        let cfg = DetectionConfig::default();
        assert!(!is_flagged(&stat(10, 2, 10), &cfg));
        let legacy = DetectionConfig::legacy();
        assert!(is_flagged(&stat(10, 2, 10), &legacy));
        assert!(!is_flagged(&OpponentStat::default(), &legacy));
    }

    #[test]
    fn kda_rule_fires_without_loss_ratio() {
        let mut cfg = DetectionConfig::default();
        cfg.max_subject_kda = Some(0.5);
        let mut s = stat(4, 4, 1);
        s.subject_kda_total = 1.2;
        let finding = classify(&[s], 4, &cfg);
        assert_eq!(finding.len(), 1);
        assert!(finding[0].detail.contains("KDA"));
        assert!(!finding[0].detail.contains("lost 25%"));
    }

    #[test]
    fn min_matches_suppresses_findings() {
        let mut cfg = DetectionConfig::default();
        cfg.min_matches = 5;
        assert!(classify(&[stat(4, 4, 4)], 4, &cfg).is_empty());
        assert_eq!(classify(&[stat(4, 4, 4)], 5, &cfg).len(), 1);
    }
}

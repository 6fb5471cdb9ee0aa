use valo_abuse_terminal::aggregator::OpponentStat;
use valo_abuse_terminal::classifier::{classify, is_flagged};
use valo_abuse_terminal::config::{DetectionConfig, SideMode};

fn stat(encounters: u32, as_enemy: u32, subject_losses: u32) -> OpponentStat {
    OpponentStat {
        puuid: format!("p-{encounters}-{as_enemy}-{subject_losses}"),
        display_name: "Someone#TAG".to_string(),
        encounters,
        as_ally: encounters - as_enemy,
        as_enemy,
        subject_losses,
        ..OpponentStat::default()
    }
}

#[test]
fn flagging_is_monotonic_in_losses() {
    for cfg in [DetectionConfig::default(), DetectionConfig::legacy()] {
        for encounters in 1..=12u32 {
            for as_enemy in 0..=encounters {
                let mut seen_flag = false;
                for losses in 0..=encounters {
                    let flagged = is_flagged(&stat(encounters, as_enemy, losses), &cfg);
                    assert!(
                        !(seen_flag && !flagged),
                        "flag dropped at {encounters}/{as_enemy}/{losses} ({:?})",
                        cfg.side_mode
                    );
                    seen_flag |= flagged;
                }
            }
        }
    }
}

#[test]
fn threshold_boundaries_are_inclusive() {
    let cfg = DetectionConfig::default();
    assert!(is_flagged(&stat(3, 3, 3), &cfg));
    assert!(!is_flagged(&stat(3, 2, 3), &cfg));
    assert!(is_flagged(&stat(8, 3, 6), &cfg));
    assert!(!is_flagged(&stat(8, 3, 5), &cfg));

    let legacy = DetectionConfig::legacy();
    assert!(is_flagged(&stat(5, 0, 4), &legacy));
    assert!(!is_flagged(&stat(4, 4, 4), &legacy));
}

#[test]
fn findings_follow_input_order_and_describe_the_pattern() {
    let opponents = vec![stat(6, 6, 6), stat(2, 2, 2), stat(4, 3, 3)];
    let findings = classify(&opponents, 10, &DetectionConfig::default());
    let ids: Vec<_> = findings.iter().map(|f| f.puuid.as_str()).collect();
    assert_eq!(ids, vec!["p-6-6-6", "p-4-3-3"]);

    let detail = &findings[0].detail;
    assert!(detail.contains("Someone#TAG"));
    assert!(detail.contains("met 6 times"));
    assert!(detail.contains("100%"));
    assert!((findings[1].loss_ratio - 0.75).abs() < 1e-9);
}

#[test]
fn ignore_side_detail_lists_both_sides() {
    let cfg = DetectionConfig {
        side_mode: SideMode::IgnoreSide,
        enemy_threshold: 3,
        ..DetectionConfig::default()
    };
    let findings = classify(&[stat(4, 1, 4)], 4, &cfg);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].detail.contains("3 ally / 1 enemy"));
}

use crate::model::{AcuityLevel, PhaseResult, Report};
use crate::recommend::{RecommendationInputs, recommendations};
use crate::stats::ResponseTimeStats;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use visus_core::{EyePhase, PHASE_NOT_COMPLETED_TEXT, StimulusCatalog, TrialRecord};

fn default_ideal_response_ms() -> u64 {
    2500
}

fn default_max_acceptable_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScoringConfig {
    /// Average response time that still earns a full speed score.
    #[serde(default = "default_ideal_response_ms")]
    pub ideal_response_ms: u64,
    /// Average response time at which the speed score bottoms out at 50.
    #[serde(default = "default_max_acceptable_ms")]
    pub max_acceptable_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ideal_response_ms: default_ideal_response_ms(),
            max_acceptable_ms: default_max_acceptable_ms(),
        }
    }
}

/// 100 up to the ideal time, then linear down to a floor of 50 at the
/// maximum acceptable time.
pub fn response_speed_score(average_ms: f64, config: &ScoringConfig) -> f64 {
    let ideal = config.ideal_response_ms as f64;
    let max = config.max_acceptable_ms as f64;
    if average_ms <= ideal {
        return 100.0;
    }
    let span = (max - ideal).max(1.0);
    let penalty = ((average_ms - ideal) / span * 50.0).min(50.0);
    (100.0 - penalty).max(50.0)
}

/// Records that point into the catalog, keeping the first one per
/// (phase, index).
fn catalog_records(history: &[TrialRecord], catalog: &StimulusCatalog) -> Vec<TrialRecord> {
    let mut seen = HashSet::new();
    history
        .iter()
        .filter(|r| {
            if r.stimulus_index >= catalog.len() {
                warn!(
                    phase = %r.phase,
                    index = r.stimulus_index,
                    catalog = catalog.len(),
                    "ignoring record outside the catalog"
                );
                return false;
            }
            if !seen.insert((r.phase, r.stimulus_index)) {
                warn!(phase = %r.phase, index = r.stimulus_index, "ignoring duplicate record");
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Pads every phase up to the catalog length with "not completed"
/// placeholders, so an aborted session still scores as a full session.
pub fn backfill_history(history: &[TrialRecord], catalog: &StimulusCatalog) -> Vec<TrialRecord> {
    let mut padded = catalog_records(history, catalog);
    let Some(latest) = padded.iter().map(|r| r.start_time).max() else {
        return padded;
    };
    let recorded = padded.len();
    for phase in EyePhase::ALL {
        for item in catalog.iter() {
            let present = padded[..recorded]
                .iter()
                .any(|r| r.phase == phase && r.stimulus_index == item.id);
            if !present {
                padded.push(TrialRecord::skipped(
                    phase,
                    item.id,
                    item.canonical_name.clone(),
                    latest,
                    PHASE_NOT_COMPLETED_TEXT,
                ));
            }
        }
    }
    padded
}

/// Builds the full report from a trial history. `None` when nothing was recorded.
pub fn compute_report(
    history: &[TrialRecord],
    catalog: &StimulusCatalog,
    config: &ScoringConfig,
) -> Option<Report> {
    let history = catalog_records(history, catalog);
    if history.is_empty() {
        return None;
    }
    let started_at = history.iter().map(|r| r.start_time).min()?;
    let finished_at = history.iter().map(|r| r.end_time()).max()?;

    let trials = backfill_history(&history, catalog);
    let (completed, skipped): (Vec<&TrialRecord>, Vec<&TrialRecord>) =
        trials.iter().partition(|r| !r.was_skipped);

    let correct = completed.iter().filter(|r| r.is_correct).count();
    let accuracy = if completed.is_empty() {
        0.0
    } else {
        correct as f64 / completed.len() as f64 * 100.0
    };

    let times: Vec<f64> = completed
        .iter()
        .map(|r| r.response_time_ms.unwrap_or(0) as f64)
        .collect();
    let stats = ResponseTimeStats::from_samples(&times);

    let speed = response_speed_score(stats.mean_ms, config);
    let efficiency = (accuracy / 100.0) * (speed / 100.0) * 100.0;
    let overall = accuracy * 0.7 + speed * 0.3;
    let consistency = (100.0 - stats.std_dev_ms / 100.0).max(0.0);
    let level = AcuityLevel::classify(accuracy, speed);

    let phase_results = EyePhase::ALL
        .iter()
        .map(|&phase| {
            let subset: Vec<&TrialRecord> = trials.iter().filter(|r| r.phase == phase).collect();
            PhaseResult {
                phase,
                correct_responses: subset
                    .iter()
                    .filter(|r| r.is_correct && !r.was_skipped)
                    .count(),
                total_tests: catalog.len(),
                skipped: subset.iter().filter(|r| r.was_skipped).count(),
            }
        })
        .collect();

    let flag_referral = !skipped.is_empty();
    let recommendations = recommendations(&RecommendationInputs {
        accuracy,
        average_response_ms: stats.mean_ms,
        std_dev_ms: stats.std_dev_ms,
        ideal_response_ms: config.ideal_response_ms as f64,
        flag_referral,
    });

    debug!(
        completed = completed.len(),
        skipped = skipped.len(),
        accuracy,
        speed,
        level = level.label(),
        "report computed"
    );

    Some(Report {
        total_images: trials.len(),
        completed_tests: completed.len(),
        skipped_tests: skipped.len(),
        correct_responses: correct,
        recognition_accuracy: accuracy,
        average_response_time_ms: stats.mean_ms,
        response_speed_score: speed,
        visual_acuity_score: efficiency,
        overall_score: overall,
        standard_deviation_ms: stats.std_dev_ms,
        consistency_score: consistency,
        acuity_level: level,
        interpretation: level.interpretation().to_string(),
        phase_results,
        should_flag_referral: flag_referral,
        recommendations,
        started_at,
        finished_at,
        trials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::{NORMAL_ADVICE, REFERRAL};
    use chrono::{DateTime, Duration, Utc};
    use visus_core::PHASE_SKIPPED_TEXT;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    fn catalog() -> StimulusCatalog {
        StimulusCatalog::from_names(["cat", "dog"]).unwrap()
    }

    fn answered(phase: EyePhase, index: usize, offset_s: i64, ms: u64, ok: bool) -> TrialRecord {
        let name = if index == 0 { "cat" } else { "dog" };
        TrialRecord::answered(phase, index, name, t0() + Duration::seconds(offset_s), ms, ok, name)
    }

    #[test]
    fn empty_history_has_no_report() {
        assert!(compute_report(&[], &catalog(), &ScoringConfig::default()).is_none());
    }

    #[test]
    fn speed_score_boundaries() {
        let config = ScoringConfig::default();
        assert_eq!(response_speed_score(0.0, &config), 100.0);
        assert_eq!(response_speed_score(2500.0, &config), 100.0);
        assert_eq!(response_speed_score(3750.0, &config), 75.0);
        assert_eq!(response_speed_score(5000.0, &config), 50.0);
        assert_eq!(response_speed_score(9000.0, &config), 50.0);
    }

    #[test]
    fn only_skipped_trials_default_to_ideal_speed() {
        let history: Vec<TrialRecord> = (0..2)
            .map(|i| TrialRecord::skipped(EyePhase::LeftEye, i, "x", t0(), PHASE_SKIPPED_TEXT))
            .collect();
        let report = compute_report(&history, &catalog(), &ScoringConfig::default()).unwrap();
        assert_eq!(report.completed_tests, 0);
        assert_eq!(report.skipped_tests, 6);
        assert_eq!(report.recognition_accuracy, 0.0);
        assert_eq!(report.response_speed_score, 100.0);
        assert_eq!(report.average_response_time_ms, 0.0);
        assert!(report.should_flag_referral);
    }

    #[test]
    fn aborted_session_is_backfilled() {
        let history = vec![answered(EyePhase::LeftEye, 0, 0, 2000, true)];
        let report = compute_report(&history, &catalog(), &ScoringConfig::default()).unwrap();
        assert_eq!(report.total_images, 6);
        assert_eq!(report.completed_tests, 1);
        assert_eq!(report.skipped_tests, 5);
        let filler: Vec<&TrialRecord> = report.trials.iter().skip(1).collect();
        assert!(filler.iter().all(|r| r.was_skipped && !r.is_correct));
        assert!(filler.iter().all(|r| r.transcribed_text == PHASE_NOT_COMPLETED_TEXT));
        assert_eq!(report.phase(EyePhase::LeftEye).unwrap().skipped, 1);
        assert_eq!(report.phase(EyePhase::RightEye).unwrap().skipped, 2);
    }

    #[test]
    fn full_session_scores_and_recommends() {
        let history = vec![
            answered(EyePhase::LeftEye, 0, 0, 2000, true),
            answered(EyePhase::LeftEye, 1, 5, 3000, false),
            TrialRecord::skipped(EyePhase::RightEye, 0, "cat", t0() + Duration::seconds(10), PHASE_SKIPPED_TEXT),
            TrialRecord::skipped(EyePhase::RightEye, 1, "dog", t0() + Duration::seconds(10), PHASE_SKIPPED_TEXT),
            answered(EyePhase::BothEyes, 0, 20, 2000, true),
            answered(EyePhase::BothEyes, 1, 25, 3000, true),
        ];
        let report = compute_report(&history, &catalog(), &ScoringConfig::default()).unwrap();

        assert_eq!(report.total_images, 6);
        assert_eq!(report.completed_tests, 4);
        assert_eq!(report.skipped_tests, 2);
        assert_eq!(report.correct_responses, 3);
        assert_eq!(report.recognition_accuracy, 75.0);
        assert_eq!(report.average_response_time_ms, 2500.0);
        assert_eq!(report.response_speed_score, 100.0);
        assert_eq!(report.standard_deviation_ms, 500.0);
        assert_eq!(report.consistency_score, 95.0);
        assert_eq!(report.overall_score, 75.0 * 0.7 + 100.0 * 0.3);
        assert_eq!(report.visual_acuity_score, 75.0);
        assert_eq!(report.acuity_level, AcuityLevel::Borderline);
        assert!(report.should_flag_referral);
        assert_eq!(report.recommendations[..2], REFERRAL.map(String::from));
        assert!(!report.recommendations.iter().any(|r| r == NORMAL_ADVICE));

        let right = report.phase(EyePhase::RightEye).unwrap();
        assert_eq!((right.correct_responses, right.total_tests, right.skipped), (0, 2, 2));
        let both = report.phase(EyePhase::BothEyes).unwrap();
        assert_eq!((both.correct_responses, both.skipped), (2, 0));

        assert_eq!(report.started_at, t0());
        assert_eq!(report.session_duration(), std::time::Duration::from_secs(28));
    }

    #[test]
    fn records_outside_the_catalog_are_ignored() {
        let catalog = StimulusCatalog::from_names(["cat"]).unwrap();
        let history = vec![
            TrialRecord::skipped(EyePhase::LeftEye, 0, "cat", t0(), PHASE_SKIPPED_TEXT),
            TrialRecord::skipped(EyePhase::LeftEye, 1, "dog", t0(), PHASE_SKIPPED_TEXT),
            TrialRecord::answered(EyePhase::RightEye, 0, "cat", t0(), 1500, true, "cat"),
            TrialRecord::answered(EyePhase::RightEye, 0, "cat", t0(), 1500, false, "cap"),
        ];
        let report = compute_report(&history, &catalog, &ScoringConfig::default()).unwrap();
        assert_eq!(report.total_images, catalog.session_trials());
        assert_eq!(report.correct_responses, 1);

        let left = report.phase(EyePhase::LeftEye).unwrap();
        assert_eq!((left.skipped, left.total_tests), (1, 1));
        assert_eq!(left.accuracy(), 0.0);
        assert_eq!(report.phase(EyePhase::RightEye).unwrap().accuracy(), 100.0);

        let stray = vec![TrialRecord::skipped(EyePhase::LeftEye, 5, "x", t0(), PHASE_SKIPPED_TEXT)];
        assert!(compute_report(&stray, &catalog, &ScoringConfig::default()).is_none());
    }

    #[test]
    fn recomputing_is_byte_identical() {
        let history = vec![
            answered(EyePhase::LeftEye, 0, 0, 2100, true),
            answered(EyePhase::LeftEye, 1, 4, 4700, false),
            answered(EyePhase::RightEye, 0, 9, 1300, true),
        ];
        let config = ScoringConfig::default();
        let first = compute_report(&history, &catalog(), &config).unwrap();
        let second = compute_report(&history, &catalog(), &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}

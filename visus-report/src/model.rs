use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use visus_core::{EyePhase, TrialRecord};

/// Overall rating, derived from accuracy and response speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcuityLevel {
    Excellent,
    Good,
    Borderline,
    BelowNormal,
}

impl AcuityLevel {
    /// First matching tier wins.
    pub fn classify(accuracy: f64, speed_score: f64) -> Self {
        if accuracy >= 90.0 && speed_score >= 80.0 {
            AcuityLevel::Excellent
        } else if accuracy >= 80.0 && speed_score >= 70.0 {
            AcuityLevel::Good
        } else if accuracy >= 70.0 || speed_score >= 60.0 {
            AcuityLevel::Borderline
        } else {
            AcuityLevel::BelowNormal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AcuityLevel::Excellent => "Excellent",
            AcuityLevel::Good => "Good",
            AcuityLevel::Borderline => "Borderline",
            AcuityLevel::BelowNormal => "Below Normal",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            AcuityLevel::Excellent => {
                "Pictures were recognized quickly and accurately. Visual recognition appears well within normal range."
            }
            AcuityLevel::Good => {
                "Pictures were recognized reliably with good response speed. Minor variations are within normal range."
            }
            AcuityLevel::Borderline => {
                "Recognition or response speed was reduced in part of the test. A professional eye examination is advisable."
            }
            AcuityLevel::BelowNormal => {
                "Recognition accuracy and response speed were both below the expected range. A professional eye examination is strongly advised."
            }
        }
    }
}

/// Outcome for one phase, after padding to the full catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub phase: EyePhase,
    pub correct_responses: usize,
    pub total_tests: usize,
    pub skipped: usize,
}

impl PhaseResult {
    pub fn accuracy(&self) -> f64 {
        let answered = self.total_tests.saturating_sub(self.skipped);
        if answered == 0 {
            0.0
        } else {
            self.correct_responses as f64 / answered as f64 * 100.0
        }
    }
}

/// Read-only assessment result, always rebuilt in full from a trial history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_images: usize,
    pub completed_tests: usize,
    pub skipped_tests: usize,
    pub correct_responses: usize,
    pub recognition_accuracy: f64,
    pub average_response_time_ms: f64,
    pub response_speed_score: f64,
    /// Processing efficiency: accuracy weighted by speed.
    pub visual_acuity_score: f64,
    pub overall_score: f64,
    pub standard_deviation_ms: f64,
    pub consistency_score: f64,
    pub acuity_level: AcuityLevel,
    pub interpretation: String,
    pub phase_results: Vec<PhaseResult>,
    pub should_flag_referral: bool,
    pub recommendations: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Padded history the report was computed from.
    pub trials: Vec<TrialRecord>,
}

impl Report {
    pub fn phase(&self, phase: EyePhase) -> Option<&PhaseResult> {
        self.phase_results.iter().find(|r| r.phase == phase)
    }

    /// Time from the first trial start to the end of the last response.
    pub fn session_duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.session_duration())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `"45s"` below a minute, `"3m 07s"` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acuity_tiers_respect_boundaries() {
        assert_eq!(AcuityLevel::classify(90.0, 80.0), AcuityLevel::Excellent);
        assert_eq!(AcuityLevel::classify(89.9, 80.0), AcuityLevel::Good);
        assert_eq!(AcuityLevel::classify(80.0, 69.9), AcuityLevel::Borderline);
        assert_eq!(AcuityLevel::classify(10.0, 60.0), AcuityLevel::Borderline);
        assert_eq!(AcuityLevel::classify(69.9, 59.9), AcuityLevel::BelowNormal);
    }

    #[test]
    fn phase_accuracy_never_underflows() {
        let phase = PhaseResult {
            phase: EyePhase::LeftEye,
            correct_responses: 0,
            total_tests: 1,
            skipped: 2,
        };
        assert_eq!(phase.accuracy(), 0.0);
        let phase = PhaseResult {
            correct_responses: 1,
            skipped: 1,
            total_tests: 3,
            ..phase
        };
        assert_eq!(phase.accuracy(), 50.0);
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_millis(45_900)), "45s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m 07s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}

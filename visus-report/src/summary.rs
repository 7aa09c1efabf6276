use crate::model::Report;
use std::fmt;

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Visual acuity assessment")?;
        writeln!(f, "  Level:              {}", self.acuity_level.label())?;
        writeln!(f, "  {}", self.interpretation)?;
        writeln!(f, "  Overall score:      {:.1}", self.overall_score)?;
        writeln!(
            f,
            "  Recognition:        {:.1}% ({}/{} answered, {} skipped)",
            self.recognition_accuracy, self.correct_responses, self.completed_tests, self.skipped_tests
        )?;
        writeln!(
            f,
            "  Avg response:       {:.2}s (speed score {:.1})",
            self.average_response_time_ms / 1000.0,
            self.response_speed_score
        )?;
        writeln!(f, "  Processing:         {:.1}", self.visual_acuity_score)?;
        writeln!(
            f,
            "  Consistency:        {:.1} (sd {:.0} ms)",
            self.consistency_score, self.standard_deviation_ms
        )?;
        for phase in &self.phase_results {
            writeln!(
                f,
                "  {:<19} {}/{} correct ({:.0}% of answered), {} skipped",
                format!("{}:", phase.phase),
                phase.correct_responses,
                phase.total_tests,
                phase.accuracy(),
                phase.skipped
            )?;
        }
        writeln!(f, "  Duration:           {}", self.formatted_duration())?;
        if self.should_flag_referral {
            writeln!(f, "  Referral recommended")?;
        }
        writeln!(f, "Recommendations:")?;
        for rec in &self.recommendations {
            writeln!(f, "  - {rec}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{ScoringConfig, compute_report};
    use chrono::Utc;
    use visus_core::{EyePhase, StimulusCatalog, TrialRecord};

    #[test]
    fn summary_lists_phases_and_advice() {
        let catalog = StimulusCatalog::from_names(["cat"]).unwrap();
        let history = vec![TrialRecord::answered(EyePhase::LeftEye, 0, "cat", Utc::now(), 1800, true, "cat")];
        let report = compute_report(&history, &catalog, &ScoringConfig::default()).unwrap();
        let text = report.to_string();
        assert!(text.contains("Left Eye:"));
        assert!(text.contains("1/1 correct (100% of answered), 0 skipped"));
        assert!(text.contains("Both Eyes:"));
        assert!(text.contains("Referral recommended"));
        assert!(text.lines().any(|l| l.starts_with("  - ")));
    }
}

//! Append-only record of every trial in a session.

use crate::{EyePhase, TrialRecord};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("trial {index} of {phase} is already recorded")]
    DuplicateTrial { phase: EyePhase, index: usize },
}

/// Ordered trial history. Records can be appended but never changed or removed,
/// and at most one record exists per (phase, stimulus index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionHistory {
    records: Vec<TrialRecord>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TrialRecord) -> Result<(), HistoryError> {
        if self.contains(record.phase, record.stimulus_index) {
            return Err(HistoryError::DuplicateTrial {
                phase: record.phase,
                index: record.stimulus_index,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn contains(&self, phase: EyePhase, index: usize) -> bool {
        self.records
            .iter()
            .any(|r| r.phase == phase && r.stimulus_index == index)
    }

    /// Number of records already present for `phase`.
    pub fn count_for(&self, phase: EyePhase) -> usize {
        self.records.iter().filter(|r| r.phase == phase).count()
    }

    pub fn for_phase(&self, phase: EyePhase) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn duplicate_phase_index_pairs_are_rejected() {
        let mut history = SessionHistory::new();
        let now = Utc::now();
        history
            .push(TrialRecord::answered(EyePhase::LeftEye, 0, "cat", now, 1200, true, "cat"))
            .unwrap();
        history
            .push(TrialRecord::answered(EyePhase::RightEye, 0, "cat", now, 900, true, "cat"))
            .unwrap();

        let dup = history.push(TrialRecord::skipped(EyePhase::LeftEye, 0, "cat", now, "x"));
        assert_eq!(
            dup,
            Err(HistoryError::DuplicateTrial {
                phase: EyePhase::LeftEye,
                index: 0
            })
        );
        assert_eq!(history.len(), 2);
        assert_eq!(history.count_for(EyePhase::LeftEye), 1);
        assert_eq!(history.count_for(EyePhase::BothEyes), 0);
    }
}

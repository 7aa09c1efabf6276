use serde::{Deserialize, Serialize};
use std::fmt;

/// Testing phases, run in a fixed order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EyePhase {
    LeftEye,
    RightEye,
    BothEyes,
}

impl Default for EyePhase {
    fn default() -> Self {
        EyePhase::LeftEye
    }
}

impl EyePhase {
    pub const ALL: [EyePhase; 3] = [EyePhase::LeftEye, EyePhase::RightEye, EyePhase::BothEyes];

    /// Phase that follows this one, `None` once both eyes have been tested.
    pub fn next(&self) -> Option<Self> {
        use EyePhase::*;
        Some(match self {
            LeftEye => RightEye,
            RightEye => BothEyes,
            BothEyes => return None,
        })
    }

    pub fn is_binocular(&self) -> bool {
        matches!(self, EyePhase::BothEyes)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EyePhase::LeftEye => "Left Eye",
            EyePhase::RightEye => "Right Eye",
            EyePhase::BothEyes => "Both Eyes",
        }
    }

    /// Instruction shown before the phase starts.
    pub fn instruction(&self) -> &'static str {
        match self {
            EyePhase::LeftEye => "Cover your right eye and name each picture out loud.",
            EyePhase::RightEye => "Cover your left eye and name each picture out loud.",
            EyePhase::BothEyes => "Keep both eyes open and name each picture out loud.",
        }
    }
}

impl fmt::Display for EyePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order_and_end() {
        assert_eq!(EyePhase::LeftEye.next(), Some(EyePhase::RightEye));
        assert_eq!(EyePhase::RightEye.next(), Some(EyePhase::BothEyes));
        assert_eq!(EyePhase::BothEyes.next(), None);
        assert_eq!(EyePhase::default(), EyePhase::LeftEye);
    }
}

//! Follow-up advice attached to a report.

pub const SLOW_RESPONSE_MS: f64 = 4000.0;
pub const INCONSISTENT_STD_DEV_MS: f64 = 1500.0;
pub const LOW_ACCURACY: f64 = 70.0;
pub const URGENT_ACCURACY: f64 = 50.0;
pub const EXCELLENT_ACCURACY: f64 = 90.0;

pub const REFERRAL: [&str; 2] = [
    "One or more test phases were skipped or not completed. Please consult an eye care professional for a complete evaluation.",
    "Schedule a comprehensive eye examination to assess the eye(s) that could not be tested.",
];
pub const LOW_ACCURACY_ADVICE: [&str; 2] = [
    "Recognition accuracy was below the expected range. A comprehensive eye examination is recommended.",
    "Consider having your glasses or contact lens prescription checked.",
];
pub const SLOW_RESPONSE_ADVICE: [&str; 2] = [
    "Responses were slower than typical, which may indicate reduced visual processing speed.",
    "Repeat the test in good lighting and when rested to confirm the result.",
];
pub const INCONSISTENT_ADVICE: &str =
    "Response times varied considerably between pictures. Retesting is advised to confirm consistency.";
pub const POSITIVE_ADVICE: [&str; 2] = [
    "Excellent visual recognition performance.",
    "Continue with routine eye examinations as recommended for your age group.",
];
pub const URGENT_ADVICE: &str =
    "Urgent: recognition accuracy was significantly reduced. Please seek prompt evaluation by an eye care professional.";
pub const NORMAL_ADVICE: &str = "Results are within normal limits. Continue routine eye care.";

/// Inputs the recommendation rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationInputs {
    pub accuracy: f64,
    pub average_response_ms: f64,
    pub std_dev_ms: f64,
    pub ideal_response_ms: f64,
    pub flag_referral: bool,
}

/// Every applicable rule contributes, in a fixed order. Never empty.
pub fn recommendations(inputs: &RecommendationInputs) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    if inputs.flag_referral {
        out.extend(REFERRAL.iter().map(|s| s.to_string()));
    }
    if inputs.accuracy < LOW_ACCURACY {
        out.extend(LOW_ACCURACY_ADVICE.iter().map(|s| s.to_string()));
    }
    if inputs.average_response_ms > SLOW_RESPONSE_MS {
        out.extend(SLOW_RESPONSE_ADVICE.iter().map(|s| s.to_string()));
    }
    if inputs.std_dev_ms > INCONSISTENT_STD_DEV_MS {
        out.push(INCONSISTENT_ADVICE.to_string());
    }
    if inputs.accuracy >= EXCELLENT_ACCURACY
        && inputs.average_response_ms <= inputs.ideal_response_ms
        && !inputs.flag_referral
    {
        out.extend(POSITIVE_ADVICE.iter().map(|s| s.to_string()));
    }
    if inputs.accuracy < URGENT_ACCURACY {
        out.push(URGENT_ADVICE.to_string());
    }

    if out.is_empty() {
        out.push(NORMAL_ADVICE.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> RecommendationInputs {
        RecommendationInputs {
            accuracy: 85.0,
            average_response_ms: 3000.0,
            std_dev_ms: 400.0,
            ideal_response_ms: 2500.0,
            flag_referral: false,
        }
    }

    #[test]
    fn falls_back_to_normal_limits() {
        assert_eq!(recommendations(&inputs()), vec![NORMAL_ADVICE.to_string()]);
    }

    #[test]
    fn rules_stack_in_order() {
        let recs = recommendations(&RecommendationInputs {
            accuracy: 40.0,
            average_response_ms: 4500.0,
            std_dev_ms: 1600.0,
            flag_referral: true,
            ..inputs()
        });
        let expected: Vec<String> = REFERRAL
            .iter()
            .chain(LOW_ACCURACY_ADVICE.iter())
            .chain(SLOW_RESPONSE_ADVICE.iter())
            .map(|s| s.to_string())
            .chain([INCONSISTENT_ADVICE.to_string(), URGENT_ADVICE.to_string()])
            .collect();
        assert_eq!(recs, expected);
    }

    #[test]
    fn positive_advice_needs_no_referral() {
        let fast = RecommendationInputs {
            accuracy: 95.0,
            average_response_ms: 2000.0,
            ..inputs()
        };
        assert_eq!(recommendations(&fast)[0], POSITIVE_ADVICE[0]);

        let referred = RecommendationInputs {
            flag_referral: true,
            ..fast
        };
        assert!(!recommendations(&referred).iter().any(|r| r == POSITIVE_ADVICE[0]));
    }
}

/// Summary of a set of response times, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResponseTimeStats {
    pub mean_ms: f64,
    /// Population standard deviation around `mean_ms`.
    pub std_dev_ms: f64,
}

impl ResponseTimeStats {
    pub fn from_samples(times: &[f64]) -> Self {
        if times.is_empty() {
            return Self::default();
        }
        let sum: f64 = times.iter().sum();
        let mean = sum / times.len() as f64;
        let var = times.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / times.len() as f64;
        Self {
            mean_ms: mean,
            std_dev_ms: var.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_dev() {
        let stats = ResponseTimeStats::from_samples(&[2000.0, 4000.0, 4000.0, 4000.0, 5000.0, 5000.0, 7000.0, 9000.0]);
        assert_eq!(stats.mean_ms, 5000.0);
        assert_eq!(stats.std_dev_ms, 2000.0);
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(ResponseTimeStats::from_samples(&[]), ResponseTimeStats::default());
    }
}

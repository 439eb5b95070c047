use crate::config::ThresholdConfig;
use crate::model::ConfidenceTier;

/// Bucket a confidence score. Boundaries are inclusive lower bounds.
pub fn classify(confidence: f64, thresholds: &ThresholdConfig) -> ConfidenceTier {
    if confidence >= thresholds.high {
        ConfidenceTier::High
    } else if confidence >= thresholds.medium {
        ConfidenceTier::Medium
    } else if confidence >= thresholds.accept {
        ConfidenceTier::Low
    } else {
        ConfidenceTier::Unmatched
    }
}

impl ConfidenceTier {
    pub fn is_matched(self) -> bool {
        self != ConfidenceTier::Unmatched
    }

    /// Accepted, but a person should confirm it.
    pub fn requires_review(self) -> bool {
        self == ConfidenceTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(c: f64) -> ConfidenceTier {
        classify(c, &ThresholdConfig::default())
    }

    #[test]
    fn boundaries() {
        assert_eq!(tier(100.0), ConfidenceTier::High);
        assert_eq!(tier(90.0), ConfidenceTier::High);
        assert_eq!(tier(89.99), ConfidenceTier::Medium);
        assert_eq!(tier(80.0), ConfidenceTier::Medium);
        assert_eq!(tier(79.9), ConfidenceTier::Low);
        assert_eq!(tier(50.0), ConfidenceTier::Low);
        assert_eq!(tier(49.9), ConfidenceTier::Unmatched);
        assert_eq!(tier(0.0), ConfidenceTier::Unmatched);
    }

    #[test]
    fn review_only_for_low() {
        assert!(tier(50.0).requires_review());
        assert!(!tier(85.0).requires_review());
        assert!(!tier(10.0).requires_review());
        assert!(!tier(10.0).is_matched());
    }

    #[test]
    fn custom_thresholds() {
        let t = ThresholdConfig {
            accept: 60.0,
            medium: 70.0,
            high: 95.0,
        };
        assert_eq!(classify(55.0, &t), ConfidenceTier::Unmatched);
        assert_eq!(classify(92.0, &t), ConfidenceTier::Medium);
    }
}

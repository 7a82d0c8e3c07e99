use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("max questions per topic must be at least 2, got {0}")]
    CeilingTooLow(u32),
    #[error("weak ratio threshold must be in (0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("pass rule {numerator}/{denominator} is not a fraction in (0, 1]")]
    InvalidPassRule { numerator: u32, denominator: u32 },
}

/// Minimum share of correct answers, as an exact fraction, needed to pass a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRule {
    numerator: u32,
    denominator: u32,
}

impl PassRule {
    /// # Errors
    ///
    /// Returns `PolicyError::InvalidPassRule` unless `0 < numerator <= denominator`.
    pub fn new(numerator: u32, denominator: u32) -> Result<Self, PolicyError> {
        if numerator == 0 || denominator == 0 || numerator > denominator {
            return Err(PolicyError::InvalidPassRule {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// `correct / total >= numerator / denominator`, evaluated without floats.
    /// An empty test never passes.
    #[must_use]
    pub fn is_met(&self, correct: u32, total: u32) -> bool {
        total > 0
            && u64::from(correct) * u64::from(self.denominator)
                >= u64::from(total) * u64::from(self.numerator)
    }
}

/// Tunables of the adaptive engine.
///
/// Defaults: 5 questions per topic, a topic below 50% correct is weak, a standard
/// follow-up needs 2/3 and an advanced follow-up needs 80%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentPolicy {
    max_questions_per_topic: u32,
    weak_ratio_threshold: f64,
    standard_pass: PassRule,
    advanced_pass: PassRule,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            max_questions_per_topic: 5,
            weak_ratio_threshold: 0.5,
            standard_pass: PassRule {
                numerator: 2,
                denominator: 3,
            },
            advanced_pass: PassRule {
                numerator: 4,
                denominator: 5,
            },
        }
    }
}

impl AssessmentPolicy {
    /// # Errors
    ///
    /// Returns `PolicyError` if the ceiling is below 2 or the ratio is outside `(0, 1]`.
    pub fn new(
        max_questions_per_topic: u32,
        weak_ratio_threshold: f64,
        standard_pass: PassRule,
        advanced_pass: PassRule,
    ) -> Result<Self, PolicyError> {
        if max_questions_per_topic < 2 {
            return Err(PolicyError::CeilingTooLow(max_questions_per_topic));
        }
        if !(weak_ratio_threshold > 0.0 && weak_ratio_threshold <= 1.0) {
            return Err(PolicyError::InvalidRatio(weak_ratio_threshold));
        }
        Ok(Self {
            max_questions_per_topic,
            weak_ratio_threshold,
            standard_pass,
            advanced_pass,
        })
    }

    #[must_use]
    pub fn max_questions_per_topic(&self) -> u32 {
        self.max_questions_per_topic
    }

    #[must_use]
    pub fn weak_ratio_threshold(&self) -> f64 {
        self.weak_ratio_threshold
    }

    #[must_use]
    pub fn standard_pass(&self) -> PassRule {
        self.standard_pass
    }

    #[must_use]
    pub fn advanced_pass(&self) -> PassRule {
        self.advanced_pass
    }
}

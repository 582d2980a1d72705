//! Salary bounds checking.

use serde::{Deserialize, Serialize};

use super::money::Money;

/// Configured limits for a salary change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalaryBounds {
    /// Largest allowed multiple of the current salary.
    pub max_increase_factor: f64,
    /// Smallest allowed multiple of the current salary.
    pub min_decrease_factor: f64,
    /// Hard upper limit regardless of the current salary.
    pub absolute_ceiling: Money,
}

impl Default for SalaryBounds {
    fn default() -> Self {
        Self {
            max_increase_factor: 2.0,
            min_decrease_factor: 0.5,
            absolute_ceiling: Money::from_units(1_000_000),
        }
    }
}

/// Salary bounds that cannot be used for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid salary bounds: {0}")]
pub struct InvalidBounds(pub &'static str);

impl SalaryBounds {
    /// Check that the bounds describe a usable range. NaN factors fail.
    ///
    /// # Errors
    ///
    /// Returns the first unusable bound.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn check(&self) -> Result<(), InvalidBounds> {
        if !(self.max_increase_factor >= 1.0 && self.max_increase_factor.is_finite()) {
            return Err(InvalidBounds("max_increase_factor must be finite and at least 1.0"));
        }
        if !(self.min_decrease_factor > 0.0 && self.min_decrease_factor <= 1.0) {
            return Err(InvalidBounds("min_decrease_factor must be in (0.0, 1.0]"));
        }
        if !self.absolute_ceiling.is_positive() {
            return Err(InvalidBounds("absolute_ceiling must be positive"));
        }
        Ok(())
    }
}

/// The rule a proposed salary broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("must be positive")]
    NonPositive,

    #[error("increase too large")]
    IncreaseTooLarge { limit: Money },

    #[error("decrease too large")]
    DecreaseTooLarge { limit: Money },

    #[error("exceeds maximum")]
    ExceedsCeiling { ceiling: Money },
}

impl Rejection {
    /// The bound that was crossed, if the rule has one.
    #[must_use]
    pub fn limit(&self) -> Option<Money> {
        match self {
            Self::NonPositive => None,
            Self::IncreaseTooLarge { limit } | Self::DecreaseTooLarge { limit } => Some(*limit),
            Self::ExceedsCeiling { ceiling } => Some(*ceiling),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted,
    Rejected(Rejection),
}

impl ValidationResult {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Accepted => None,
            Self::Rejected(rejection) => Some(*rejection),
        }
    }

    /// Human-readable reason for a rejection.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.rejection().map(|r| r.to_string())
    }
}

/// Check a proposed salary against the current one. Rules are evaluated in
/// order and the first failure wins.
#[must_use]
pub fn validate(current: Money, proposed: Money, bounds: &SalaryBounds) -> ValidationResult {
    if !proposed.is_positive() {
        return ValidationResult::Rejected(Rejection::NonPositive);
    }

    let limit = current.scale(bounds.max_increase_factor);
    if proposed > limit {
        return ValidationResult::Rejected(Rejection::IncreaseTooLarge { limit });
    }

    let limit = current.scale(bounds.min_decrease_factor);
    if proposed < limit {
        return ValidationResult::Rejected(Rejection::DecreaseTooLarge { limit });
    }

    if proposed > bounds.absolute_ceiling {
        return ValidationResult::Rejected(Rejection::ExceedsCeiling {
            ceiling: bounds.absolute_ceiling,
        });
    }

    ValidationResult::Accepted
}

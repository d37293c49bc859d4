use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Calculation error in '{0}': square root of a negative variance")]
    NegativeVariance(String),

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(String),
}

/// Why an allocation could not be computed. Every variant is reported to the
/// caller verbatim; there is no fallback plan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("target volume must be > 0, got {0}")]
    NonPositiveTarget(Decimal),

    #[error("shares must satisfy 0 <= min_share <= max_share <= 1 (min_share={min}, max_share={max})")]
    InvalidShares { min: Decimal, max: Decimal },

    #[error("risk aversion must be >= 0, got {0}")]
    NegativeRiskAversion(Decimal),

    #[error("capacity percentile must be within 0..1, got {0}")]
    InvalidPercentile(Decimal),

    #[error("at least two makers are required to optimize, found {0}")]
    NotEnoughMakers(usize),

    #[error("sum of lower bounds {lower_total} exceeds the target volume {target} (min_share too high)")]
    LowerBoundsExceedTarget { lower_total: Decimal, target: Decimal },

    #[error("total capacity {capacity_total} is below the target volume {target} (raise max_share or lower the target)")]
    InsufficientCapacity { capacity_total: Decimal, target: Decimal },

    #[error("maker {maker}: capacity-limited upper bound {upper} is below the lower bound {lower}")]
    BoundsConflict {
        maker: String,
        lower: Decimal,
        upper: Decimal,
    },

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

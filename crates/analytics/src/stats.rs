//! Sample statistics over `Decimal` series.

use crate::error::AnalyticsError;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

fn overflow(what: &str) -> AnalyticsError {
    AnalyticsError::Overflow(what.to_string())
}

/// `*total += value`, failing instead of panicking past `Decimal::MAX`.
pub fn add_to(total: &mut Decimal, value: Decimal, what: &str) -> Result<(), AnalyticsError> {
    *total = total.checked_add(value).ok_or_else(|| overflow(what))?;
    Ok(())
}

pub fn checked_sum(values: impl IntoIterator<Item = Decimal>, what: &str) -> Result<Decimal, AnalyticsError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v).ok_or_else(|| overflow(what)))
}

pub fn checked_mul(a: Decimal, b: Decimal, what: &str) -> Result<Decimal, AnalyticsError> {
    a.checked_mul(b).ok_or_else(|| overflow(what))
}

pub fn mean(values: &[Decimal], what: &str) -> Result<Option<Decimal>, AnalyticsError> {
    if values.is_empty() {
        return Ok(None);
    }
    let sum = checked_sum(values.iter().copied(), what)?;
    Ok(Some(sum / Decimal::from(values.len())))
}

/// Sample standard deviation (n - 1 denominator). `None` below two points.
///
/// Deviations are divided by the largest one before squaring, so the squares
/// stay within 0..1 whatever the magnitude of the inputs.
pub fn sample_std(values: &[Decimal], metric: &str) -> Result<Option<Decimal>, AnalyticsError> {
    if values.len() < 2 {
        return Ok(None);
    }
    let Some(mean) = mean(values, metric)? else {
        return Ok(None);
    };
    let deviations = values
        .iter()
        .map(|v| v.checked_sub(mean).ok_or_else(|| overflow(metric)))
        .collect::<Result<Vec<_>, _>>()?;
    let scale = deviations.iter().map(Decimal::abs).max().unwrap_or_default();
    if scale.is_zero() {
        return Ok(Some(Decimal::ZERO));
    }

    let squares = checked_sum(
        deviations.iter().map(|d| {
            let unit = *d / scale;
            unit * unit
        }),
        metric,
    )?;
    let variance = squares / Decimal::from(values.len() - 1);

    let root = variance
        .sqrt()
        .ok_or_else(|| AnalyticsError::NegativeVariance(metric.to_string()))?;
    checked_mul(root, scale, metric).map(Some)
}

/// Percentile of an ascending-sorted series, interpolating linearly between
/// the two closest ranks. `p` is clamped to 0..1.
pub fn percentile(sorted: &[Decimal], p: Decimal) -> Option<Decimal> {
    let last = sorted.len().checked_sub(1)?;
    let p = p.clamp(Decimal::ZERO, Decimal::ONE);
    let rank = p * Decimal::from(last);
    let lo = rank.floor();
    let lo_idx = lo.to_usize().unwrap_or(0).min(last);
    let hi_idx = (lo_idx + 1).min(last);
    let fraction = rank - lo;
    Some(sorted[lo_idx] + (sorted[hi_idx] - sorted[lo_idx]) * fraction)
}

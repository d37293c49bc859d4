//! Maker allocation: split a target volume between makers at the lowest
//! expected cost.
//!
//! The cost of giving `x` to maker `m` is `(avg_rate_m + risk_aversion *
//! std_rate_m) * x`. Volumes are boxed by a uniform minimum and maximum share
//! of the target and by each maker's historical daily capacity. With a single
//! equality constraint and box bounds, filling the cheapest makers first from
//! their lower bounds is an exact solution of the linear program.

use crate::error::{AllocationError, AnalyticsError};
use crate::stats::{add_to, checked_mul, checked_sum, mean, percentile, sample_std};
use chrono::NaiveDate;
use core_types::TradeRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Inputs of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub target_volume: Decimal,
    pub min_share: Decimal,
    pub max_share: Decimal,
    pub risk_aversion: Decimal,
    pub capacity_percentile: Decimal,
}

impl AllocationRequest {
    fn validate(&self) -> Result<(), AllocationError> {
        if self.target_volume <= Decimal::ZERO {
            return Err(AllocationError::NonPositiveTarget(self.target_volume));
        }
        if !(Decimal::ZERO <= self.min_share && self.min_share <= self.max_share && self.max_share <= Decimal::ONE) {
            return Err(AllocationError::InvalidShares {
                min: self.min_share,
                max: self.max_share,
            });
        }
        if self.risk_aversion < Decimal::ZERO {
            return Err(AllocationError::NegativeRiskAversion(self.risk_aversion));
        }
        if !(Decimal::ZERO..=Decimal::ONE).contains(&self.capacity_percentile) {
            return Err(AllocationError::InvalidPercentile(self.capacity_percentile));
        }
        Ok(())
    }
}

/// Historical profile of one maker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MakerStats {
    pub maker_bank: String,
    pub avg_rate: Decimal,
    /// Sample standard deviation; 0 for a single trade.
    pub std_rate: Decimal,
    pub total_volume: Decimal,
    /// Percentile of the maker's per-day volume.
    pub capacity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRow {
    pub maker_bank: String,
    pub avg_rate: Decimal,
    pub std_rate: Decimal,
    pub capacity: Decimal,
    pub lower_bound: Decimal,
    pub upper_bound: Decimal,
    pub alloc_volume: Decimal,
    /// Fraction of the target, 0..1.
    pub alloc_pct: Decimal,
    pub unit_cost: Decimal,
    /// `alloc_volume * avg_rate`.
    pub cost: Decimal,
    /// `alloc_volume * unit_cost`.
    pub risk_adj_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Sorted by allocated volume, largest first.
    pub rows: Vec<AllocationRow>,
    pub target_volume: Decimal,
    pub expected_cost: Decimal,
    pub risk_adjusted_cost: Decimal,
    /// Cost of splitting the target by historical volume share instead.
    pub baseline_cost: Decimal,
}

/// Per-maker rate profile and capacity, ordered by bank name.
pub fn maker_stats(records: &[TradeRecord], capacity_percentile: Decimal) -> Result<Vec<MakerStats>, AllocationError> {
    let mut rates: BTreeMap<&str, Vec<Decimal>> = BTreeMap::new();
    let mut daily: BTreeMap<&str, BTreeMap<NaiveDate, Decimal>> = BTreeMap::new();
    for r in records {
        rates.entry(&r.maker_bank).or_default().push(r.rate);
        let day = daily
            .entry(&r.maker_bank)
            .or_default()
            .entry(r.trade_date)
            .or_insert(Decimal::ZERO);
        add_to(day, r.amount, "daily volume")?;
    }

    let mut stats = Vec::with_capacity(rates.len());
    for (maker, maker_rates) in rates {
        let mut days: Vec<Decimal> = daily.get(maker).map(|d| d.values().copied().collect()).unwrap_or_default();
        days.sort();
        stats.push(MakerStats {
            maker_bank: maker.to_string(),
            avg_rate: mean(&maker_rates, "rate")?.unwrap_or_default(),
            std_rate: sample_std(&maker_rates, "rate")?.unwrap_or_default(),
            total_volume: checked_sum(days.iter().copied(), "volume")?,
            capacity: percentile(&days, capacity_percentile).unwrap_or_default(),
        });
    }
    Ok(stats)
}

/// Computes the cheapest feasible allocation of `request.target_volume`.
pub fn optimize_allocation(
    records: &[TradeRecord],
    request: &AllocationRequest,
) -> Result<AllocationPlan, AllocationError> {
    request.validate()?;
    let target = request.target_volume;

    let stats = maker_stats(records, request.capacity_percentile)?;
    if stats.len() < 2 {
        return Err(AllocationError::NotEnoughMakers(stats.len()));
    }

    let lower = request.min_share * target;
    let max_volume = request.max_share * target;
    let mut rows: Vec<AllocationRow> = Vec::with_capacity(stats.len());
    for s in stats {
        let upper = max_volume.min(s.capacity);
        if upper < lower {
            return Err(AllocationError::BoundsConflict {
                maker: s.maker_bank,
                lower,
                upper,
            });
        }
        let unit_cost = checked_mul(request.risk_aversion, s.std_rate, "unit cost")?
            .checked_add(s.avg_rate)
            .ok_or_else(|| AnalyticsError::Overflow("unit cost".to_string()))?;
        rows.push(AllocationRow {
            unit_cost,
            maker_bank: s.maker_bank,
            avg_rate: s.avg_rate,
            std_rate: s.std_rate,
            capacity: s.capacity,
            lower_bound: lower,
            upper_bound: upper,
            alloc_volume: lower,
            alloc_pct: Decimal::ZERO,
            cost: Decimal::ZERO,
            risk_adj_cost: Decimal::ZERO,
        });
    }

    let lower_total = checked_sum(rows.iter().map(|r| r.lower_bound), "lower bounds")?;
    if lower_total > target {
        return Err(AllocationError::LowerBoundsExceedTarget { lower_total, target });
    }
    let capacity_total = checked_sum(rows.iter().map(|r| r.upper_bound), "capacity")?;
    if capacity_total < target {
        return Err(AllocationError::InsufficientCapacity { capacity_total, target });
    }

    // Cheapest first; ties go to the alphabetically first maker.
    rows.sort_by(|a, b| a.unit_cost.cmp(&b.unit_cost).then_with(|| a.maker_bank.cmp(&b.maker_bank)));
    let mut remaining = target - lower_total;
    for row in rows.iter_mut() {
        if remaining.is_zero() {
            break;
        }
        let extra = (row.upper_bound - row.lower_bound).min(remaining);
        row.alloc_volume += extra;
        remaining -= extra;
    }

    for row in rows.iter_mut() {
        row.alloc_pct = row.alloc_volume / target;
        row.cost = checked_mul(row.alloc_volume, row.avg_rate, "cost")?;
        row.risk_adj_cost = checked_mul(row.alloc_volume, row.unit_cost, "risk-adjusted cost")?;
    }
    rows.sort_by(|a, b| b.alloc_volume.cmp(&a.alloc_volume).then_with(|| a.maker_bank.cmp(&b.maker_bank)));

    let plan = AllocationPlan {
        expected_cost: checked_sum(rows.iter().map(|r| r.cost), "cost")?,
        risk_adjusted_cost: checked_sum(rows.iter().map(|r| r.risk_adj_cost), "risk-adjusted cost")?,
        baseline_cost: baseline_allocation_cost(records, target)?,
        target_volume: target,
        rows,
    };
    debug!(
        makers = plan.rows.len(),
        %target,
        expected_cost = %plan.expected_cost,
        baseline_cost = %plan.baseline_cost,
        "Computed maker allocation."
    );
    Ok(plan)
}

/// Cost of allocating `target` in proportion to each maker's historical
/// volume, priced at its mean rate. 0 when there is no volume.
pub fn baseline_allocation_cost(records: &[TradeRecord], target: Decimal) -> Result<Decimal, AnalyticsError> {
    let mut per_maker: BTreeMap<&str, (Decimal, Decimal, usize)> = BTreeMap::new();
    for r in records {
        let entry = per_maker.entry(&r.maker_bank).or_insert((Decimal::ZERO, Decimal::ZERO, 0));
        add_to(&mut entry.0, r.amount, "volume")?;
        add_to(&mut entry.1, r.rate, "rate")?;
        entry.2 += 1;
    }
    let total = checked_sum(per_maker.values().map(|(volume, _, _)| *volume), "volume")?;
    if total <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let costs = per_maker
        .values()
        .map(|(volume, rate_sum, n)| {
            let avg_rate = *rate_sum / Decimal::from(*n);
            checked_mul(*volume / total * target, avg_rate, "baseline cost")
        })
        .collect::<Result<Vec<_>, _>>()?;
    checked_sum(costs, "baseline cost")
}

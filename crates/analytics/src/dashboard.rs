//! Stateless computations behind the dashboard views.
//!
//! Every function takes the trade history in chronological order (as
//! returned by `TradeStore::load_all`) and never fails on an empty slice.
//! Totals that would leave the `Decimal` range are reported as
//! `AnalyticsError::Overflow`.

use crate::error::AnalyticsError;
use crate::report::{BankShare, DashboardHeatmaps, Heatmap, Kpi, MetricStats, MinutePoint};
use crate::stats::{add_to, checked_sum, mean, percentile, sample_std};
use chrono::NaiveDate;
use core_types::{BankSide, Metric, TradeRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

/// At most this many KPI cards are shown.
pub const MAX_KPIS: usize = 4;

pub fn metric_value(record: &TradeRecord, metric: Metric) -> Decimal {
    match metric {
        Metric::Amount => record.amount,
        Metric::Rate => record.rate,
        Metric::Hour => Decimal::from(record.hour),
        Metric::Minute => Decimal::from(record.minute),
    }
}

/// Last value, previous value and percentage change for up to four metrics.
pub fn kpis(records: &[TradeRecord], metrics: &[Metric]) -> Result<Vec<Kpi>, AnalyticsError> {
    let Some(last) = records.last() else {
        return Ok(Vec::new());
    };
    let before = records.len().checked_sub(2).map(|i| &records[i]).unwrap_or(last);

    metrics
        .iter()
        .take(MAX_KPIS)
        .map(|&metric| {
            let current = metric_value(last, metric);
            let previous = metric_value(before, metric);
            let delta_pct = if previous.is_zero() {
                Decimal::ZERO
            } else {
                (current - previous)
                    .checked_div(previous)
                    .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                    .ok_or_else(|| AnalyticsError::Overflow(format!("{metric} change")))?
            };
            Ok(Kpi {
                metric,
                current,
                previous,
                delta_pct,
            })
        })
        .collect()
}

/// count / mean / std / min / quartiles / max of one metric.
pub fn describe(records: &[TradeRecord], metric: Metric) -> Result<MetricStats, AnalyticsError> {
    let mut values: Vec<Decimal> = records.iter().map(|r| metric_value(r, metric)).collect();
    let std = sample_std(&values, metric.as_str())?;
    let mean = mean(&values, metric.as_str())?;
    values.sort();

    Ok(MetricStats {
        metric,
        count: values.len(),
        mean,
        std,
        min: values.first().copied(),
        p25: percentile(&values, dec!(0.25)),
        p50: percentile(&values, dec!(0.5)),
        p75: percentile(&values, dec!(0.75)),
        max: values.last().copied(),
    })
}

fn volume_by<K: Ord>(
    records: &[TradeRecord],
    key: impl Fn(&TradeRecord) -> K,
) -> Result<BTreeMap<K, Decimal>, AnalyticsError> {
    let mut totals = BTreeMap::new();
    for r in records {
        add_to(totals.entry(key(r)).or_insert(Decimal::ZERO), r.amount, "volume")?;
    }
    Ok(totals)
}

/// Keys ordered by total descending, ties by key.
fn ranked<K: Ord>(totals: BTreeMap<K, Decimal>) -> Vec<(K, Decimal)> {
    let mut ranked: Vec<(K, Decimal)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Volume per bank on one side of the trade, largest first.
pub fn bank_volume_shares(records: &[TradeRecord], side: BankSide) -> Result<Vec<BankShare>, AnalyticsError> {
    let totals = volume_by(records, |r| r.bank(side).to_string())?;
    let grand_total = checked_sum(totals.values().copied(), "volume")?;

    Ok(ranked(totals)
        .into_iter()
        .map(|(bank, volume)| BankShare {
            share_pct: if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                (volume / grand_total * Decimal::ONE_HUNDRED).round_dp(2)
            },
            bank,
            volume,
        })
        .collect())
}

/// The `n` makers with the highest volume.
pub fn top_banks(records: &[TradeRecord], n: usize) -> Result<Vec<String>, AnalyticsError> {
    Ok(ranked(volume_by(records, |r| r.maker_bank.clone())?)
        .into_iter()
        .take(n)
        .map(|(bank, _)| bank)
        .collect())
}

fn pivot<R, C>(
    cells: &BTreeMap<(R, C), Decimal>,
    rows: &[R],
    columns: &[C],
    missing: Option<Decimal>,
) -> Heatmap
where
    R: Ord + Clone + Display,
    C: Ord + Clone + Display,
{
    Heatmap {
        rows: rows.iter().map(ToString::to_string).collect(),
        columns: columns.iter().map(ToString::to_string).collect(),
        values: rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| cells.get(&(r.clone(), c.clone())).copied().or(missing))
                    .collect()
            })
            .collect(),
    }
}

/// Volume per maker (rows, by volume) and hour of day (columns, numeric).
pub fn maker_hour_heatmap(records: &[TradeRecord]) -> Result<Heatmap, AnalyticsError> {
    let cells = volume_by(records, |r| (r.maker_bank.clone(), r.hour))?;
    let rows: Vec<String> = ranked(volume_by(records, |r| r.maker_bank.clone())?)
        .into_iter()
        .map(|(bank, _)| bank)
        .collect();
    let mut hours: Vec<u8> = records.iter().map(|r| r.hour).collect();
    hours.sort_unstable();
    hours.dedup();

    let mut map = pivot(&cells, &rows, &hours, Some(Decimal::ZERO));
    map.columns = hours.iter().map(|h| format!("{h:02}")).collect();
    Ok(map)
}

/// Maker × taker volume, restricted to trades where both sides are among
/// the `top_n` makers by volume.
pub fn maker_taker_heatmap(records: &[TradeRecord], top_n: usize) -> Result<Heatmap, AnalyticsError> {
    let keep: HashSet<String> = top_banks(records, top_n)?.into_iter().collect();
    let limited: Vec<TradeRecord> = records
        .iter()
        .filter(|r| keep.contains(&r.maker_bank) && keep.contains(&r.taker_bank))
        .cloned()
        .collect();

    let cells = volume_by(&limited, |r| (r.maker_bank.clone(), r.taker_bank.clone()))?;
    let rows: Vec<String> = ranked(volume_by(&limited, |r| r.maker_bank.clone())?)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    let columns: Vec<String> = ranked(volume_by(&limited, |r| r.taker_bank.clone())?)
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    Ok(pivot(&cells, &rows, &columns, Some(Decimal::ZERO)))
}

/// Mean rate per hour (rows) and minute (columns). Empty cells are `None`.
pub fn rate_hour_minute_heatmap(records: &[TradeRecord]) -> Result<Heatmap, AnalyticsError> {
    let mut sums: BTreeMap<(u8, u8), (Decimal, usize)> = BTreeMap::new();
    for r in records {
        let cell = sums.entry((r.hour, r.minute)).or_insert((Decimal::ZERO, 0));
        add_to(&mut cell.0, r.rate, "rate")?;
        cell.1 += 1;
    }
    let cells: BTreeMap<(u8, u8), Decimal> = sums
        .into_iter()
        .map(|(k, (sum, n))| (k, sum / Decimal::from(n)))
        .collect();

    let mut hours: Vec<u8> = cells.keys().map(|(h, _)| *h).collect();
    hours.dedup();
    let mut minutes: Vec<u8> = cells.keys().map(|(_, m)| *m).collect();
    minutes.sort_unstable();
    minutes.dedup();

    let mut map = pivot(&cells, &hours, &minutes, None);
    map.rows = hours.iter().map(|h| format!("{h:02}")).collect();
    map.columns = minutes.iter().map(|m| format!("{m:02}")).collect();
    Ok(map)
}

pub fn heatmaps(records: &[TradeRecord], top_n: usize) -> Result<DashboardHeatmaps, AnalyticsError> {
    Ok(DashboardHeatmaps {
        maker_hour: maker_hour_heatmap(records)?,
        maker_taker: maker_taker_heatmap(records, top_n)?,
        rate_hour_minute: rate_hour_minute_heatmap(records)?,
    })
}

/// Per (day, `HH:MM`) volume, trade count and rate range.
pub fn minute_series(records: &[TradeRecord]) -> Result<Vec<MinutePoint>, AnalyticsError> {
    let mut buckets: BTreeMap<(NaiveDate, u8, u8), Vec<&TradeRecord>> = BTreeMap::new();
    for r in records {
        buckets.entry((r.trade_date, r.hour, r.minute)).or_default().push(r);
    }

    buckets
        .into_iter()
        .map(|((trade_date, _, _), trades)| {
            let rates: Vec<Decimal> = trades.iter().map(|t| t.rate).collect();
            Ok(MinutePoint {
                trade_date,
                minute: trades[0].minute_key(),
                volume: checked_sum(trades.iter().map(|t| t.amount), "volume")?,
                count: trades.len(),
                mean_rate: mean(&rates, "rate")?.unwrap_or_default(),
                min_rate: rates.iter().copied().min().unwrap_or_default(),
                max_rate: rates.iter().copied().max().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(day: u32, amount: Decimal, rate: Decimal, maker: &str, taker: &str, hour: u8, minute: u8) -> TradeRecord {
        TradeRecord::try_new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            amount,
            rate,
            maker,
            taker,
            hour,
            minute,
        )
        .unwrap()
    }

    fn history() -> Vec<TradeRecord> {
        vec![
            trade(5, dec!(100), dec!(1.10), "BNP", "ACME", 9, 30),
            trade(5, dec!(300), dec!(1.12), "SOCGEN", "BNP", 9, 30),
            trade(5, dec!(50), dec!(1.08), "BNP", "SOCGEN", 10, 0),
            trade(6, dec!(200), dec!(1.06), "HSBC", "ACME", 10, 15),
        ]
    }

    #[test]
    fn kpis_compare_the_last_two_trades() {
        let k = kpis(&history(), &[Metric::Amount, Metric::Hour]).unwrap();
        assert_eq!(k.len(), 2);
        assert_eq!((k[0].current, k[0].previous), (dec!(200), dec!(50)));
        assert_eq!(k[0].delta_pct, dec!(300));
        assert_eq!(k[1].delta_pct, Decimal::ZERO);
    }

    #[test]
    fn kpis_of_a_single_trade_have_no_delta() {
        let one = &history()[..1];
        let k = kpis(one, &[Metric::Rate]).unwrap();
        assert_eq!(k[0].previous, k[0].current);
        assert_eq!(k[0].delta_pct, Decimal::ZERO);
    }

    #[test]
    fn kpis_with_a_zero_previous_value_report_no_change() {
        let mut trades = history();
        trades[2].minute = 0;
        trades[3].minute = 15;
        let k = kpis(&trades, &[Metric::Minute]).unwrap();
        assert_eq!(k[0].delta_pct, Decimal::ZERO);
    }

    #[test]
    fn kpis_are_capped_at_four() {
        let all = [Metric::Amount, Metric::Rate, Metric::Hour, Metric::Minute, Metric::Amount];
        assert_eq!(kpis(&history(), &all).unwrap().len(), MAX_KPIS);
        assert!(kpis(&[], &all).unwrap().is_empty());
    }

    #[test]
    fn describe_amounts() {
        let s = describe(&history(), Metric::Amount).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, Some(dec!(162.5)));
        assert_eq!(s.min, Some(dec!(50)));
        assert_eq!(s.p25, Some(dec!(87.5)));
        assert_eq!(s.p50, Some(dec!(150)));
        assert_eq!(s.p75, Some(dec!(225)));
        assert_eq!(s.max, Some(dec!(300)));
        assert!(s.std.is_some());

        let empty = describe(&[], Metric::Rate).unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!((empty.mean, empty.std, empty.p50), (None, None, None));
    }

    #[test]
    fn describe_handles_amounts_in_the_quadrillions() {
        let trades = vec![
            trade(5, Decimal::ZERO, dec!(1.1), "BNP", "ACME", 9, 0),
            trade(5, dec!(1_000_000_000_000_000), dec!(1.1), "BNP", "ACME", 9, 1),
        ];
        let s = describe(&trades, Metric::Amount).unwrap();
        assert_eq!(s.mean, Some(dec!(500_000_000_000_000)));
        assert_eq!(s.std.map(|v| v.round_dp(0)), Some(dec!(707106781186548)));
        assert_eq!(s.max, Some(dec!(1_000_000_000_000_000)));
    }

    #[test]
    fn volumes_beyond_the_decimal_range_are_errors() {
        let trades = vec![
            trade(5, Decimal::MAX, dec!(1.1), "BNP", "ACME", 9, 0),
            trade(5, Decimal::MAX, dec!(1.1), "BNP", "ACME", 9, 1),
        ];
        let overflow = Err(AnalyticsError::Overflow("volume".to_string()));
        assert_eq!(bank_volume_shares(&trades, BankSide::Maker), overflow);
        assert!(heatmaps(&trades, 5).is_err());
        assert!(minute_series(&trades).is_ok());
        assert!(describe(&trades, Metric::Amount).is_err());
    }

    #[test]
    fn maker_shares_sum_to_one_hundred() {
        let shares = bank_volume_shares(&history(), BankSide::Maker).unwrap();
        let banks: Vec<_> = shares.iter().map(|s| s.bank.as_str()).collect();
        assert_eq!(banks, vec!["SOCGEN", "HSBC", "BNP"]);
        assert_eq!(shares[0].share_pct, dec!(46.15));
        let total: Decimal = shares.iter().map(|s| s.share_pct).sum();
        assert!((total - Decimal::ONE_HUNDRED).abs() <= dec!(0.02));
    }

    #[test]
    fn top_banks_rank_makers_by_volume() {
        assert_eq!(top_banks(&history(), 2).unwrap(), vec!["SOCGEN", "HSBC"]);
        assert_eq!(top_banks(&history(), 10).unwrap().len(), 3);
    }

    #[test]
    fn maker_hour_cells_default_to_zero() {
        let map = maker_hour_heatmap(&history()).unwrap();
        assert_eq!(map.rows, vec!["SOCGEN", "HSBC", "BNP"]);
        assert_eq!(map.columns, vec!["09", "10"]);
        assert_eq!(map.get("BNP", "09"), Some(dec!(100)));
        assert_eq!(map.get("HSBC", "09"), Some(Decimal::ZERO));
    }

    #[test]
    fn maker_taker_matrix_only_keeps_top_banks() {
        let map = maker_taker_heatmap(&history(), 3).unwrap();
        // ACME never makes a price, so trades against it drop out.
        assert_eq!(map.rows, vec!["SOCGEN", "BNP"]);
        assert_eq!(map.columns, vec!["BNP", "SOCGEN"]);
        assert_eq!(map.get("SOCGEN", "BNP"), Some(dec!(300)));
        assert_eq!(map.get("SOCGEN", "SOCGEN"), Some(Decimal::ZERO));
    }

    #[test]
    fn rate_heatmap_leaves_gaps_empty() {
        let map = rate_hour_minute_heatmap(&history()).unwrap();
        assert_eq!(map.rows, vec!["09", "10"]);
        assert_eq!(map.columns, vec!["00", "15", "30"]);
        assert_eq!(map.get("09", "30"), Some(dec!(1.11)));
        assert_eq!(map.get("09", "00"), None);
    }

    #[test]
    fn minute_series_groups_by_day_and_minute() {
        let series = minute_series(&history()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].minute, "09:30");
        assert_eq!(series[0].volume, dec!(400));
        assert_eq!(series[0].count, 2);
        assert_eq!((series[0].min_rate, series[0].max_rate), (dec!(1.10), dec!(1.12)));
        assert_eq!(series[2].trade_date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
    }
}

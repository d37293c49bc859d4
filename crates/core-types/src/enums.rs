use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A field of the canonical trade schema, plus the auxiliary columns
/// (`date_time`, `hour`, `minute`) the column mapper knows how to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    TradeDate,
    Amount,
    Rate,
    MakerBank,
    TakerBank,
    DateTime,
    Hour,
    Minute,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::TradeDate,
        CanonicalField::Amount,
        CanonicalField::Rate,
        CanonicalField::MakerBank,
        CanonicalField::TakerBank,
        CanonicalField::DateTime,
        CanonicalField::Hour,
        CanonicalField::Minute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::TradeDate => "trade_date",
            CanonicalField::Amount => "amount",
            CanonicalField::Rate => "rate",
            CanonicalField::MakerBank => "maker_bank",
            CanonicalField::TakerBank => "taker_bank",
            CanonicalField::DateTime => "date_time",
            CanonicalField::Hour => "hour",
            CanonicalField::Minute => "minute",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalField::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| CoreError::InvalidInput("canonical field".to_string(), s.to_string()))
    }
}

/// Which counterparty of a trade a bank appears on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankSide {
    Maker,
    Taker,
}

/// The grouping key of an aggregate query.
///
/// Every variant maps to one `GROUP BY` clause over the `trades` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    MakerBank,
    TakerBank,
    TradeDate,
    Hour,
    /// `HH:MM` buckets across all dates.
    HourMinute,
    /// `HH:MM` buckets within each date.
    DateMinute,
    MakerTaker,
    MakerHour,
}

impl GroupBy {
    pub const ALL: [GroupBy; 8] = [
        GroupBy::MakerBank,
        GroupBy::TakerBank,
        GroupBy::TradeDate,
        GroupBy::Hour,
        GroupBy::HourMinute,
        GroupBy::DateMinute,
        GroupBy::MakerTaker,
        GroupBy::MakerHour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::MakerBank => "maker_bank",
            GroupBy::TakerBank => "taker_bank",
            GroupBy::TradeDate => "trade_date",
            GroupBy::Hour => "hour",
            GroupBy::HourMinute => "hour_minute",
            GroupBy::DateMinute => "date_minute",
            GroupBy::MakerTaker => "maker_taker",
            GroupBy::MakerHour => "maker_hour",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupBy::ALL
            .into_iter()
            .find(|g| g.as_str() == s.trim())
            .ok_or_else(|| CoreError::InvalidInput("group_by".to_string(), s.to_string()))
    }
}

/// A numeric column of the trade table that the dashboard can plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Amount,
    Rate,
    Hour,
    Minute,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Amount => "amount",
            Metric::Rate => "rate",
            Metric::Hour => "hour",
            Metric::Minute => "minute",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "amount" => Ok(Metric::Amount),
            "rate" => Ok(Metric::Rate),
            "hour" => Ok(Metric::Hour),
            "minute" => Ok(Metric::Minute),
            other => Err(CoreError::InvalidInput("metric".to_string(), other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_by_names_round_trip_through_from_str() {
        for g in GroupBy::ALL {
            assert_eq!(g.as_str().parse::<GroupBy>().unwrap(), g);
        }
        assert!("by_moon_phase".parse::<GroupBy>().is_err());
    }

    #[test]
    fn metric_rejects_unknown_names() {
        assert_eq!(" rate ".parse::<Metric>().unwrap(), Metric::Rate);
        assert!("volume".parse::<Metric>().is_err());
    }
}

use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Sentinel stored in place of a missing or blank counterparty name.
pub const UNKNOWN_BANK: &str = "UNKNOWN BANK";

/// A single, fully validated foreign-exchange trade.
///
/// Instances that come out of `TradeRecord::try_new` always satisfy the table
/// invariants: non-negative amount, positive rate, hour in `0..=23`, minute in
/// `0..=59` and uppercase, non-empty bank names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub trade_date: NaiveDate,
    pub amount: Decimal,
    pub rate: Decimal,
    pub maker_bank: String,
    pub taker_bank: String,
    #[sqlx(try_from = "i16")]
    pub hour: u8,
    #[sqlx(try_from = "i16")]
    pub minute: u8,
}

impl TradeRecord {
    pub fn try_new(
        trade_date: NaiveDate,
        amount: Decimal,
        rate: Decimal,
        maker_bank: impl Into<String>,
        taker_bank: impl Into<String>,
        hour: u8,
        minute: u8,
    ) -> Result<Self, CoreError> {
        let record = Self {
            trade_date,
            amount,
            rate,
            maker_bank: maker_bank.into(),
            taker_bank: taker_bank.into(),
            hour,
            minute,
        };
        record.check()?;
        Ok(record)
    }

    /// Re-checks every invariant of the persisted table.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.amount < Decimal::ZERO {
            return Err(CoreError::InvalidRecord(format!("amount {} is negative", self.amount)));
        }
        if self.rate <= Decimal::ZERO {
            return Err(CoreError::InvalidRecord(format!("rate {} is not positive", self.rate)));
        }
        if self.hour > 23 {
            return Err(CoreError::InvalidRecord(format!("hour {} is out of range", self.hour)));
        }
        if self.minute > 59 {
            return Err(CoreError::InvalidRecord(format!("minute {} is out of range", self.minute)));
        }
        for bank in [&self.maker_bank, &self.taker_bank] {
            if bank.trim().is_empty() || bank.to_uppercase() != *bank {
                return Err(CoreError::InvalidRecord(format!("bank name '{bank}' is not normalized")));
            }
        }
        Ok(())
    }

    /// The `HH:MM` bucket label used by the per-minute charts.
    pub fn minute_key(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn bank(&self, side: crate::BankSide) -> &str {
        match side {
            crate::BankSide::Maker => &self.maker_bank,
            crate::BankSide::Taker => &self.taker_bank,
        }
    }
}

/// An external dashboard (e.g. Grafana) the presentation layer embeds verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DashboardLink {
    pub id: i32,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    #[test]
    fn accepts_boundary_values() {
        let r = TradeRecord::try_new(day(), dec!(0), dec!(0.0001), "A", "B", 23, 59).unwrap();
        assert_eq!(r.minute_key(), "23:59");
    }

    #[test]
    fn rejects_broken_invariants() {
        assert!(TradeRecord::try_new(day(), dec!(-1), dec!(1), "A", "B", 0, 0).is_err());
        assert!(TradeRecord::try_new(day(), dec!(1), dec!(0), "A", "B", 0, 0).is_err());
        assert!(TradeRecord::try_new(day(), dec!(1), dec!(1), "A", "B", 24, 0).is_err());
        assert!(TradeRecord::try_new(day(), dec!(1), dec!(1), "A", "B", 0, 60).is_err());
        assert!(TradeRecord::try_new(day(), dec!(1), dec!(1), "acme", "B", 0, 0).is_err());
        assert!(TradeRecord::try_new(day(), dec!(1), dec!(1), "  ", "B", 0, 0).is_err());
    }
}

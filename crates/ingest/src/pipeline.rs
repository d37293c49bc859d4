use crate::alias::{AliasTable, ColumnMap};
use crate::error::{SchemaMappingError, ValidationError};
use crate::parse::{normalize_bank, parse_date, parse_date_time, parse_decimal, parse_whole_number};
use crate::sheet::{SheetRow, SheetTable};
use chrono::{NaiveDate, Timelike};
use core_types::{CanonicalField, TradeRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A dropped row and everything that was wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub errors: Vec<ValidationError>,
}

impl RejectedRow {
    pub fn reasons(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Counters for the user-facing cleaning report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows dropped because trade_date, amount or rate was missing or invalid.
    pub dropped_invalid: usize,
    /// Rows whose only problem was an hour or minute outside its range.
    pub dropped_out_of_range: usize,
    /// Per canonical field, how many rows had no usable value before dropping.
    pub missing_values: BTreeMap<CanonicalField, usize>,
}

/// The result of a cleaning run: what will be persisted, and what will not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub records: Vec<TradeRecord>,
    pub rejected: Vec<RejectedRow>,
    pub summary: IngestSummary,
}

/// Maps arbitrary spreadsheet headers onto the canonical trade schema and
/// turns each row into a `TradeRecord` or a `RejectedRow`.
///
/// The normalizer is a pure transformation: it never touches storage.
#[derive(Debug, Clone, Default)]
pub struct TradeNormalizer {
    aliases: AliasTable,
}

/// Column positions for one upload, after the required fields were checked.
struct ResolvedColumns {
    trade_date: Option<usize>,
    date_time: Option<usize>,
    amount: usize,
    rate: usize,
    maker_bank: Option<usize>,
    taker_bank: Option<usize>,
    hour: Option<usize>,
    minute: Option<usize>,
}

impl TradeNormalizer {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Cleans a whole table.
    ///
    /// Fails only when a required column cannot be mapped; row-level problems
    /// end up in `IngestOutcome::rejected`. Clean records are returned in
    /// chronological order.
    pub fn process(&self, table: &SheetTable) -> Result<IngestOutcome, SchemaMappingError> {
        let columns = self.resolve_columns(&table.headers)?;
        let mut outcome = IngestOutcome::default();
        outcome.summary.rows_read = table.len();

        for (line, message) in &table.malformed {
            outcome.rejected.push(RejectedRow {
                line: *line,
                errors: vec![ValidationError::Malformed {
                    message: message.clone(),
                }],
            });
            outcome.summary.dropped_invalid += 1;
        }

        for row in &table.rows {
            match self.process_row(row, &columns, &mut outcome.summary.missing_values) {
                Ok(record) => outcome.records.push(record),
                Err(errors) => {
                    if errors.iter().all(ValidationError::is_out_of_range) {
                        outcome.summary.dropped_out_of_range += 1;
                    } else {
                        outcome.summary.dropped_invalid += 1;
                    }
                    debug!(line = row.line, ?errors, "Row rejected.");
                    outcome.rejected.push(RejectedRow {
                        line: row.line,
                        errors,
                    });
                }
            }
        }

        // Stable, so rows sharing a minute keep their file order.
        outcome
            .records
            .sort_by_key(|r| (r.trade_date, r.hour, r.minute));
        outcome.rejected.sort_by_key(|r| r.line);
        outcome.summary.rows_kept = outcome.records.len();

        info!(
            rows_read = outcome.summary.rows_read,
            rows_kept = outcome.summary.rows_kept,
            dropped_invalid = outcome.summary.dropped_invalid,
            dropped_out_of_range = outcome.summary.dropped_out_of_range,
            "Cleaned uploaded trades."
        );
        Ok(outcome)
    }

    fn resolve_columns(&self, headers: &[String]) -> Result<ResolvedColumns, SchemaMappingError> {
        let map: ColumnMap = self.aliases.resolve(headers);
        let require = |field: CanonicalField| {
            map.index(field).ok_or_else(|| SchemaMappingError::MissingColumn {
                field,
                accepted: self.aliases.accepted(field).to_vec(),
            })
        };

        let trade_date = map.index(CanonicalField::TradeDate);
        let date_time = map.index(CanonicalField::DateTime);
        if trade_date.is_none() && date_time.is_none() {
            let mut accepted = self.aliases.accepted(CanonicalField::TradeDate).to_vec();
            accepted.extend_from_slice(self.aliases.accepted(CanonicalField::DateTime));
            return Err(SchemaMappingError::MissingColumn {
                field: CanonicalField::TradeDate,
                accepted,
            });
        }

        Ok(ResolvedColumns {
            trade_date,
            date_time,
            amount: require(CanonicalField::Amount)?,
            rate: require(CanonicalField::Rate)?,
            maker_bank: map.index(CanonicalField::MakerBank),
            taker_bank: map.index(CanonicalField::TakerBank),
            hour: map.index(CanonicalField::Hour),
            minute: map.index(CanonicalField::Minute),
        })
    }

    fn process_row(
        &self,
        row: &SheetRow,
        columns: &ResolvedColumns,
        missing: &mut BTreeMap<CanonicalField, usize>,
    ) -> Result<TradeRecord, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut note_missing = |field: CanonicalField| *missing.entry(field).or_insert(0) += 1;

        // A combined date/time cell, when present and filled, drives hour and minute.
        let date_time = match columns.date_time.and_then(|idx| row.cell(idx)) {
            Some(raw) => match parse_date_time(raw) {
                Some(dt) => Some(dt),
                None => {
                    errors.push(ValidationError::InvalidDate {
                        field: CanonicalField::DateTime,
                        value: raw.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        let trade_date = match columns.trade_date.and_then(|idx| row.cell(idx)) {
            Some(raw) => parse_date(raw).or_else(|| {
                errors.push(ValidationError::InvalidDate {
                    field: CanonicalField::TradeDate,
                    value: raw.to_string(),
                });
                None
            }),
            None => match date_time {
                Some(dt) => Some(dt.date()),
                None => {
                    if !errors.iter().any(|e| matches!(e, ValidationError::InvalidDate { .. })) {
                        errors.push(ValidationError::MissingValue {
                            field: CanonicalField::TradeDate,
                        });
                    }
                    None
                }
            },
        };
        if trade_date.is_none() {
            note_missing(CanonicalField::TradeDate);
        }

        let amount = numeric_cell(row, columns.amount, CanonicalField::Amount, &mut errors)
            .and_then(|v| {
                if v < Decimal::ZERO {
                    errors.push(ValidationError::Negative {
                        field: CanonicalField::Amount,
                        value: v.to_string(),
                    });
                    None
                } else {
                    Some(v)
                }
            });
        if amount.is_none() {
            note_missing(CanonicalField::Amount);
        }

        let rate = numeric_cell(row, columns.rate, CanonicalField::Rate, &mut errors).and_then(|v| {
            if v <= Decimal::ZERO {
                errors.push(ValidationError::NonPositive {
                    field: CanonicalField::Rate,
                    value: v.to_string(),
                });
                None
            } else {
                Some(v)
            }
        });
        if rate.is_none() {
            note_missing(CanonicalField::Rate);
        }

        let (hour, minute) = match date_time {
            Some(dt) => (Some(dt.hour() as u8), Some(dt.minute() as u8)),
            None => (
                clock_cell(row, columns.hour, CanonicalField::Hour, 23, &mut errors),
                clock_cell(row, columns.minute, CanonicalField::Minute, 59, &mut errors),
            ),
        };

        let maker_raw = columns.maker_bank.and_then(|idx| row.cell(idx));
        let taker_raw = columns.taker_bank.and_then(|idx| row.cell(idx));
        if maker_raw.is_none() {
            note_missing(CanonicalField::MakerBank);
        }
        if taker_raw.is_none() {
            note_missing(CanonicalField::TakerBank);
        }

        match (trade_date, amount, rate, hour, minute) {
            (Some(trade_date), Some(amount), Some(rate), Some(hour), Some(minute)) if errors.is_empty() => {
                build_record(trade_date, amount, rate, maker_raw, taker_raw, hour, minute)
            }
            _ => Err(errors),
        }
    }
}

fn build_record(
    trade_date: NaiveDate,
    amount: Decimal,
    rate: Decimal,
    maker_raw: Option<&str>,
    taker_raw: Option<&str>,
    hour: u8,
    minute: u8,
) -> Result<TradeRecord, Vec<ValidationError>> {
    TradeRecord::try_new(
        trade_date,
        amount.normalize(),
        rate.normalize(),
        normalize_bank(maker_raw),
        normalize_bank(taker_raw),
        hour,
        minute,
    )
    .map_err(|e| {
        vec![ValidationError::Malformed {
            message: e.to_string(),
        }]
    })
}

fn numeric_cell(
    row: &SheetRow,
    idx: usize,
    field: CanonicalField,
    errors: &mut Vec<ValidationError>,
) -> Option<Decimal> {
    let Some(raw) = row.cell(idx) else {
        errors.push(ValidationError::MissingValue { field });
        return None;
    };
    let parsed = parse_decimal(raw);
    if parsed.is_none() {
        errors.push(ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
    }
    parsed
}

/// Reads an hour or minute column. Absent column or blank cell means 0;
/// anything outside `0..=max` rejects the row.
fn clock_cell(
    row: &SheetRow,
    idx: Option<usize>,
    field: CanonicalField,
    max: i64,
    errors: &mut Vec<ValidationError>,
) -> Option<u8> {
    let Some(raw) = idx.and_then(|idx| row.cell(idx)) else {
        return Some(0);
    };
    let Some(value) = parse_whole_number(raw) else {
        errors.push(ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        });
        return None;
    };
    if !(0..=max).contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field,
            value,
            min: 0,
            max,
        });
        return None;
    }
    u8::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::UNKNOWN_BANK;
    use rust_decimal_macros::dec;

    fn normalizer() -> TradeNormalizer {
        TradeNormalizer::default()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> SheetTable {
        SheetTable::from_rows(
            headers.iter().copied(),
            rows.iter().map(|r| r.iter().copied()),
        )
    }

    const HEADERS: [&str; 5] = ["Trade Date", "Montant", "Taux", "Market Maker", "Market Taker"];

    #[test]
    fn french_export_row_is_normalized() {
        let t = table(&HEADERS, &[&["2024-01-05", "1 234,56", "1.085", "", "acme bank"]]);
        let outcome = normalizer().process(&t).unwrap();

        assert!(outcome.rejected.is_empty());
        assert_eq!(
            outcome.records,
            vec![TradeRecord {
                trade_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                amount: dec!(1234.56),
                rate: dec!(1.085),
                maker_bank: UNKNOWN_BANK.to_string(),
                taker_bank: "ACME BANK".to_string(),
                hour: 0,
                minute: 0,
            }]
        );
    }

    #[test]
    fn missing_rate_column_is_a_schema_error_naming_the_field() {
        let t = table(&["Trade Date", "Montant"], &[&["2024-01-05", "10"]]);
        let err = normalizer().process(&t).unwrap_err();
        assert_eq!(
            err,
            SchemaMappingError::MissingColumn {
                field: CanonicalField::Rate,
                accepted: vec!["Taux".to_string(), "Rate".to_string()],
            }
        );
        assert!(err.to_string().contains("rate"));
    }

    #[test]
    fn missing_amount_alias_is_a_schema_error() {
        let t = table(&["Trade Date", "Taux"], &[&["2024-01-05", "1.1"]]);
        let err = normalizer().process(&t).unwrap_err();
        assert!(matches!(
            err,
            SchemaMappingError::MissingColumn { field: CanonicalField::Amount, .. }
        ));
    }

    #[test]
    fn no_date_column_at_all_is_a_schema_error() {
        let t = table(&["Montant", "Taux"], &[&["10", "1.1"]]);
        let err = normalizer().process(&t).unwrap_err();
        assert!(matches!(
            err,
            SchemaMappingError::MissingColumn { field: CanonicalField::TradeDate, .. }
        ));
    }

    #[test]
    fn rows_missing_critical_fields_are_rejected_and_reported() {
        let t = table(
            &HEADERS,
            &[
                &["2024-01-05", "100", "1.1", "A", "B"],
                &["", "100", "1.1", "A", "B"],
                &["2024-01-05", "", "1.1", "A", "B"],
                &["2024-01-05", "100", "", "A", "B"],
                &["not a date", "lots", "1.1", "A", "B"],
            ],
        );
        let outcome = normalizer().process(&t).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.rejected.len(), 4);
        assert_eq!(
            outcome.rejected.iter().map(|r| r.line).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );
        assert_eq!(
            outcome.rejected[0].errors,
            vec![ValidationError::MissingValue { field: CanonicalField::TradeDate }]
        );
        assert_eq!(
            outcome.rejected[2].errors,
            vec![ValidationError::MissingValue { field: CanonicalField::Rate }]
        );
        // Every problem of a row is reported, not only the first one.
        assert_eq!(outcome.rejected[3].errors.len(), 2);
        assert_eq!(outcome.summary.dropped_invalid, 4);
        assert_eq!(outcome.summary.missing_values[&CanonicalField::Amount], 2);
    }

    #[test]
    fn row_with_missing_rate_value_adds_exactly_one_rejection() {
        let base = table(&HEADERS, &[&["2024-01-05", "100", "1.1", "A", "B"]]);
        let with_bad = table(
            &HEADERS,
            &[&["2024-01-05", "100", "1.1", "A", "B"], &["2024-01-06", "50", "", "A", "B"]],
        );
        let before = normalizer().process(&base).unwrap();
        let after = normalizer().process(&with_bad).unwrap();

        assert_eq!(after.rejected.len(), before.rejected.len() + 1);
        assert_eq!(after.records, before.records);
    }

    #[test]
    fn negative_amount_and_zero_rate_are_rejected() {
        let t = table(
            &HEADERS,
            &[&["2024-01-05", "-5", "1.1", "A", "B"], &["2024-01-05", "5", "0", "A", "B"]],
        );
        let outcome = normalizer().process(&t).unwrap();
        assert!(outcome.records.is_empty());
        assert!(matches!(outcome.rejected[0].errors[0], ValidationError::Negative { .. }));
        assert!(matches!(outcome.rejected[1].errors[0], ValidationError::NonPositive { .. }));
    }

    #[test]
    fn bank_names_are_normalized() {
        let t = table(
            &HEADERS,
            &[
                &["2024-01-05", "1", "1", "  bnp paribas ", "   "],
                &["2024-01-05", "1", "1", "SocGen", "None"],
            ],
        );
        let outcome = normalizer().process(&t).unwrap();
        let banks: Vec<_> = outcome
            .records
            .iter()
            .map(|r| (r.maker_bank.as_str(), r.taker_bank.as_str()))
            .collect();
        assert_eq!(
            banks,
            vec![("BNP PARIBAS", UNKNOWN_BANK), ("SOCGEN", UNKNOWN_BANK)]
        );
    }

    #[test]
    fn absent_bank_columns_default_to_unknown() {
        let t = table(&["Date", "Amount", "Rate"], &[&["2024-01-05", "1", "1"]]);
        let outcome = normalizer().process(&t).unwrap();
        assert_eq!(outcome.records[0].maker_bank, UNKNOWN_BANK);
        assert_eq!(outcome.records[0].taker_bank, UNKNOWN_BANK);
    }

    #[test]
    fn hour_and_minute_boundaries() {
        let headers = ["Trade Date", "Montant", "Taux", "Hour", "Minute"];
        let t = table(
            &headers,
            &[
                &["2024-01-05", "1", "1", "0", "0"],
                &["2024-01-05", "1", "1", "23", "59"],
                &["2024-01-05", "1", "1", "24", "0"],
                &["2024-01-05", "1", "1", "0", "60"],
                &["2024-01-05", "1", "1", "-1", "0"],
                &["2024-01-05", "1", "1", "", ""],
            ],
        );
        let outcome = normalizer().process(&t).unwrap();

        let kept: Vec<_> = outcome.records.iter().map(|r| (r.hour, r.minute)).collect();
        assert_eq!(kept, vec![(0, 0), (0, 0), (23, 59)]);
        assert_eq!(outcome.rejected.len(), 3);
        assert_eq!(outcome.summary.dropped_out_of_range, 3);
        assert_eq!(
            outcome.rejected[0].errors,
            vec![ValidationError::OutOfRange {
                field: CanonicalField::Hour,
                value: 24,
                min: 0,
                max: 23,
            }]
        );
        assert_eq!(
            outcome.rejected[1].errors,
            vec![ValidationError::OutOfRange {
                field: CanonicalField::Minute,
                value: 60,
                min: 0,
                max: 59,
            }]
        );
    }

    #[test]
    fn date_time_column_drives_date_hour_and_minute() {
        let t = table(
            &["Date/Time", "Montant", "Taux", "Hour"],
            &[&["2024-01-05 14:32:10", "10", "1.2", "3"], &["garbage", "10", "1.2", "3"]],
        );
        let outcome = normalizer().process(&t).unwrap();

        assert_eq!(outcome.records.len(), 1);
        let r = &outcome.records[0];
        assert_eq!(r.trade_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!((r.hour, r.minute), (14, 32));
        assert!(matches!(
            outcome.rejected[0].errors[0],
            ValidationError::InvalidDate { field: CanonicalField::DateTime, .. }
        ));
    }

    #[test]
    fn explicit_trade_date_wins_over_date_time() {
        let t = table(
            &["Trade Date", "Date/Time", "Montant", "Taux"],
            &[&["2024-01-06", "2024-01-05 09:15:00", "10", "1.2"]],
        );
        let r = &normalizer().process(&t).unwrap().records[0];
        assert_eq!(r.trade_date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!((r.hour, r.minute), (9, 15));
    }

    #[test]
    fn clean_records_come_out_in_chronological_order() {
        let headers = ["Trade Date", "Montant", "Taux", "Hour", "Minute"];
        let t = table(
            &headers,
            &[
                &["2024-01-06", "1", "1", "0", "0"],
                &["2024-01-05", "2", "1", "10", "30"],
                &["2024-01-05", "3", "1", "10", "5"],
            ],
        );
        let amounts: Vec<_> = normalizer()
            .process(&t)
            .unwrap()
            .records
            .iter()
            .map(|r| r.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2), dec!(1)]);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let mut t = table(&HEADERS, &[&["2024-01-05", "1", "1", "A", "B"]]);
        t.malformed.push((7, "invalid utf-8".to_string()));
        let outcome = normalizer().process(&t).unwrap();
        assert_eq!(outcome.summary.rows_read, 2);
        assert_eq!(outcome.rejected[0].line, 7);
        assert_eq!(outcome.rejected[0].reasons(), vec!["malformed row: invalid utf-8"]);
    }
}

//! # FX Dashboard Ingest
//!
//! The validation and normalization stage that sits between an uploaded
//! spreadsheet and the `trades` table.
//!
//! - `sheet`: CSV / workbook bytes → `SheetTable` (header + string cells).
//! - `alias`: the explicit header alias table and column resolution.
//! - `parse`: cell-level parsers (dates, decimals, clock values, bank names).
//! - `pipeline`: `TradeNormalizer`, which produces clean `TradeRecord`s plus a
//!   rejection report.
//!
//! Nothing in this crate performs I/O beyond reading the bytes it is given.

pub mod alias;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod sheet;

pub use alias::{AliasTable, ColumnMap};
pub use error::{IngestError, SchemaMappingError, SheetError, ValidationError};
pub use pipeline::{IngestOutcome, IngestSummary, RejectedRow, TradeNormalizer};
pub use sheet::{read_sheet, SheetFormat, SheetRow, SheetTable};

/// Reads an upload and cleans it in one step.
pub fn ingest_bytes(
    bytes: &[u8],
    format: SheetFormat,
    normalizer: &TradeNormalizer,
) -> Result<IngestOutcome, IngestError> {
    let table = read_sheet(bytes, format)?;
    Ok(normalizer.process(&table)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::UNKNOWN_BANK;
    use rust_decimal_macros::dec;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    /// Header on the second sheet row, one blank row between the two trades.
    fn workbook_upload() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm");
        let sheet = workbook.add_worksheet();
        for (col, header) in ["Date/Time", "Montant", "Taux", "Market Maker", "Market Taker"]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(1, col as u16, header).unwrap();
        }

        let first = ExcelDateTime::parse_from_str("2024-01-05 09:30:00").unwrap();
        sheet.write_datetime_with_format(2, 0, &first, &stamp).unwrap();
        sheet.write_number(2, 1, 1_500_000.5).unwrap();
        sheet.write_number(2, 2, 1.0875).unwrap();
        sheet.write_string(2, 3, "bnp").unwrap();
        sheet.write_string(2, 4, "acme").unwrap();

        let second = ExcelDateTime::parse_from_str("2024-01-06 14:05:00").unwrap();
        sheet.write_datetime_with_format(4, 0, &second, &stamp).unwrap();
        sheet.write_number(4, 1, 250.0).unwrap();
        sheet.write_number(4, 2, 1.09).unwrap();
        sheet.write_string(4, 3, "socgen").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn workbook_cells_are_read_as_text() {
        let table = read_sheet(&workbook_upload(), SheetFormat::Xlsx).unwrap();

        assert_eq!(table.headers, vec!["Date/Time", "Montant", "Taux", "Market Maker", "Market Taker"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!((table.rows[0].line, table.rows[1].line), (3, 5));
        assert_eq!(table.rows[0].cells, vec!["2024-01-05 09:30:00", "1500000.5", "1.0875", "bnp", "acme"]);
        assert_eq!(table.rows[1].cell(1), Some("250"));
        assert_eq!(table.rows[1].cell(4), None);
    }

    #[test]
    fn workbook_upload_end_to_end() {
        let outcome = ingest_bytes(&workbook_upload(), SheetFormat::Xlsx, &TradeNormalizer::default()).unwrap();

        assert!(outcome.rejected.is_empty());
        assert_eq!(outcome.summary.rows_read, 2);
        let [first, second] = outcome.records.as_slice() else {
            panic!("expected two records, got {:?}", outcome.records);
        };
        assert_eq!(first.trade_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!((first.hour, first.minute), (9, 30));
        assert_eq!((first.amount, first.rate), (dec!(1500000.5), dec!(1.0875)));
        assert_eq!((first.maker_bank.as_str(), first.taker_bank.as_str()), ("BNP", "ACME"));

        assert_eq!(second.trade_date, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert_eq!((second.hour, second.minute), (14, 5));
        assert_eq!(second.amount, dec!(250));
        assert_eq!(second.taker_bank, UNKNOWN_BANK);
    }

    #[test]
    fn csv_upload_end_to_end() {
        let csv = "Trade Date;Montant;Taux;Market Maker;Market Taker\n\
                   2024-01-05;1 234,56;1,085;;acme bank\n\
                   2024-01-05;10;;X;Y\n";
        let outcome = ingest_bytes(csv.as_bytes(), SheetFormat::Csv, &TradeNormalizer::default()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].amount, dec!(1234.56));
        assert_eq!(outcome.records[0].rate, dec!(1.085));
        assert_eq!(outcome.records[0].maker_bank, UNKNOWN_BANK);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].line, 3);
    }

    #[test]
    fn schema_errors_abort_the_upload() {
        let csv = "Trade Date,Montant\n2024-01-05,10\n";
        let err = ingest_bytes(csv.as_bytes(), SheetFormat::Csv, &TradeNormalizer::default()).unwrap_err();
        assert!(matches!(err, IngestError::Schema(_)));
    }
}

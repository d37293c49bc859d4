//! Turns uploaded bytes into a plain table of string cells.
//!
//! Cell typing is deliberately left to the normalizer: every reader produces
//! the same `SheetTable`, so CSV and workbook uploads go through identical
//! validation rules.

use crate::error::SheetError;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetFormat {
    Csv,
    /// Any spreadsheet calamine understands (xlsx, xlsm, xlsb, xls, ods).
    Xlsx,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Result<Self, SheetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl FromStr for SheetFormat {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "txt" => Ok(SheetFormat::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SheetFormat::Xlsx),
            other => Err(SheetError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One data row with its 1-based line number in the source (the header is line 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// The trimmed cell at `idx`, or `None` when it is absent or blank.
    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(|c| c.trim()).filter(|c| !c.is_empty())
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// A header row plus data rows. Rows the reader could not decode are kept
/// aside with their reason so they still show up in the rejection report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
    pub malformed: Vec<(usize, String)>,
}

impl SheetTable {
    /// Builds a table from in-memory values. Blank rows are skipped.
    pub fn from_rows<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| SheetRow {
                line: idx + 2,
                cells: cells.into_iter().map(Into::into).collect(),
            })
            .filter(|row| !row.is_blank())
            .collect();
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
            malformed: Vec::new(),
        }
    }

    /// Number of data rows seen, including the ones that could not be decoded.
    pub fn len(&self) -> usize {
        self.rows.len() + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn read_sheet(bytes: &[u8], format: SheetFormat) -> Result<SheetTable, SheetError> {
    match format {
        SheetFormat::Csv => read_csv(bytes),
        SheetFormat::Xlsx => read_workbook(bytes),
    }
}

/// Reads a CSV upload. The delimiter (`,` or `;`) is picked from the header
/// line, since European exports commonly use `;` with decimal commas.
pub fn read_csv(bytes: &[u8]) -> Result<SheetTable, SheetError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let delimiter = detect_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(SheetError::MissingHeader);
    }

    let mut table = SheetTable {
        headers,
        ..SheetTable::default()
    };

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx + 2;
        match result {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                let row = SheetRow {
                    line,
                    cells: record.iter().map(str::to_string).collect(),
                };
                if !row.is_blank() {
                    table.rows.push(row);
                }
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(fallback_line);
                table.malformed.push((line, e.to_string()));
            }
        }
    }

    Ok(table)
}

/// Reads the first worksheet of a spreadsheet upload.
pub fn read_workbook(bytes: &[u8]) -> Result<SheetTable, SheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SheetError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)?
        .map_err(|e| SheetError::Workbook(e.to_string()))?;

    // Sheets may not start on the first row; keep line numbers true to the file.
    let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(SheetError::MissingHeader)?
        .iter()
        .map(cell_to_string)
        .collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(SheetError::MissingHeader);
    }

    let mut table = SheetTable {
        headers,
        ..SheetTable::default()
    };
    for (idx, cells) in rows.enumerate() {
        let row = SheetRow {
            line: first_line + idx + 1,
            cells: cells.iter().map(cell_to_string).collect(),
        };
        if !row.is_blank() {
            table.rows.push(row);
        }
    }

    Ok(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::Error(e) => format!("#{e:?}"),
    }
}

fn detect_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let semicolons = header.iter().filter(|b| **b == b';').count();
    let commas = header.iter().filter(|b| **b == b',').count();
    if semicolons > commas { b';' } else { b',' }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_comma_separated_csv() {
        let csv = "Trade Date,Montant,Taux\n2024-01-05,100,1.1\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Trade Date", "Montant", "Taux"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[0].cell(1), Some("100"));
    }

    #[test]
    fn semicolon_header_switches_delimiter_and_keeps_decimal_commas() {
        let csv = "\u{feff}Trade Date;Montant;Taux\n2024-01-05;1 234,56;1,085\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.headers[0], "Trade Date");
        assert_eq!(table.rows[0].cells, vec!["2024-01-05", "1 234,56", "1,085"]);
    }

    #[test]
    fn blank_lines_are_skipped_and_short_rows_read_as_missing() {
        let csv = "A,B,C\n1,2,3\n,,\n4\n";
        let table = read_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].line, 4);
        assert_eq!(table.rows[1].cell(2), None);
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(read_csv(b""), Err(SheetError::MissingHeader)));
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(matches!(read_workbook(b"not a zip"), Err(SheetError::Workbook(_))));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(SheetFormat::from_path(Path::new("trades.XLSX")).unwrap(), SheetFormat::Xlsx);
        assert_eq!(SheetFormat::from_path(Path::new("trades.csv")).unwrap(), SheetFormat::Csv);
        assert!(SheetFormat::from_path(Path::new("trades.pdf")).is_err());
    }
}

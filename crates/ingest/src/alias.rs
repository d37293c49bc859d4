use core_types::CanonicalField;
use std::collections::HashMap;

/// Canonical field → accepted spreadsheet headers, tried in order.
///
/// Matching ignores surrounding whitespace and ASCII case, so `" montant "`
/// resolves to `amount` just like `"Montant"`.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<(CanonicalField, Vec<String>)>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let builtin: [(CanonicalField, &[&str]); 8] = [
            (CanonicalField::TradeDate, &["Trade Date", "Date"]),
            (CanonicalField::Amount, &["Montant", "Amount", "Volume"]),
            (CanonicalField::Rate, &["Taux", "Rate"]),
            (CanonicalField::MakerBank, &["Market Maker", "Maker Bank"]),
            (CanonicalField::TakerBank, &["Market Taker", "Taker Bank"]),
            (CanonicalField::DateTime, &["Date/Time", "DateTime"]),
            (CanonicalField::Hour, &["Hour", "Heure"]),
            (CanonicalField::Minute, &["Minute"]),
        ];
        Self {
            entries: builtin
                .into_iter()
                .map(|(field, headers)| (field, headers.iter().map(|h| h.to_string()).collect()))
                .collect(),
        }
    }
}

impl AliasTable {
    /// Appends extra accepted headers for a field, after the existing ones.
    pub fn with_aliases(mut self, field: CanonicalField, headers: impl IntoIterator<Item = String>) -> Self {
        let headers: Vec<String> = headers.into_iter().collect();
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => existing.extend(headers),
            None => self.entries.push((field, headers)),
        }
        self
    }

    pub fn accepted(&self, field: CanonicalField) -> &[String] {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, headers)| headers.as_slice())
            .unwrap_or(&[])
    }

    /// Maps every canonical field that has a matching header to its column index.
    pub fn resolve(&self, headers: &[String]) -> ColumnMap {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut columns = HashMap::new();

        for (field, aliases) in &self.entries {
            let hit = aliases.iter().find_map(|alias| {
                let alias = normalize_header(alias);
                normalized.iter().position(|h| *h == alias)
            });
            if let Some(idx) = hit {
                columns.insert(*field, idx);
            }
        }

        ColumnMap { columns }
    }
}

/// The outcome of header resolution: which column holds which field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<CanonicalField, usize>,
}

impl ColumnMap {
    pub fn index(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

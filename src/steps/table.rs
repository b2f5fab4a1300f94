//! Scenario data tables

use crate::common::{Error, Result};

/// A header row plus string rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Build a table from raw rows, the first being the header
    pub fn from_rows(mut raw: Vec<Vec<String>>) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Config("Data table has no header row".to_string()));
        }
        let headers: Vec<String> = raw.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
        for (i, row) in raw.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(Error::Config(format!(
                    "Data table row {} has {} cells, header has {}",
                    i + 1,
                    row.len(),
                    headers.len()
                )));
            }
        }
        Ok(Self { headers, rows: raw })
    }

    /// Convenience constructor for literal tables
    pub fn from_strs(header: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let mut raw = vec![header.iter().map(|s| s.to_string()).collect::<Vec<_>>()];
        raw.extend(rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        Self::from_rows(raw)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows.iter().map(|cells| TableRow {
            headers: &self.headers,
            cells,
        })
    }

    pub fn first(&self) -> Option<TableRow<'_>> {
        self.rows().next()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header plus rows, for feeding back into nested steps
    pub fn to_raw(&self) -> Vec<Vec<String>> {
        let mut raw = vec![self.headers.clone()];
        raw.extend(self.rows.iter().cloned());
        raw
    }
}

/// A table row addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> TableRow<'a> {
    /// Cell under `column`; missing columns are an error
    pub fn get(&self, column: &str) -> Result<&'a str> {
        self.opt(column)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))
    }

    /// Cell under `column`, if the table has that column
    pub fn opt(&self, column: &str) -> Option<&'a str> {
        let cells = self.cells;
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|i| cells.get(i))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_column() {
        let table = DataTable::from_strs(
            &["proof", "interval"],
            &[&["citizenship", "last 10 minutes"]],
        )
        .unwrap();
        let row = table.first().unwrap();
        assert_eq!(row.get("proof").unwrap(), "citizenship");
        assert_eq!(row.opt("interval"), Some("last 10 minutes"));
        assert!(matches!(row.get("who"), Err(Error::MissingColumn(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(DataTable::from_strs(&["a", "b"], &[&["1"]]).is_err());
        assert!(DataTable::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn test_round_trips_raw_rows() {
        let table = DataTable::from_strs(&["a"], &[&["1"], &["2"]]).unwrap();
        assert_eq!(DataTable::from_rows(table.to_raw()).unwrap(), table);
    }
}

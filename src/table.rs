//! In-memory candidate table.
//!
//! A thin, string-typed view over delimited files: a header plus rows of
//! opaque string cells. Components that need numbers coerce explicitly and
//! locally; the table itself never interprets cell contents.

use crate::error::{LinkerError, Result};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

/// Column holding the source-table column identifier of a candidate.
pub const COLUMN: &str = "column";
/// Column holding the source-table row identifier of a candidate.
pub const ROW: &str = "row";
/// Column holding the knowledge-graph identifier of a candidate.
pub const KG_ID: &str = "kg_id";

/// A candidate table: header + rows of string cells.
///
/// Uniqueness of rows is not guaranteed by construction; callers that need
/// it run [`CandidateTable::drop_duplicates`] or
/// [`CandidateTable::drop_duplicate_candidates`] first.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CandidateTable {
    /// Create an empty table with the given header.
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Read a table from a CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| LinkerError::io(path, e))?;
        Self::from_csv_reader(file)
    }

    /// Read a table from any CSV reader (e.g. stdin).
    ///
    /// Short records are padded with empty cells so every row matches the
    /// header width.
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            row.resize(header.len(), String::new());
            rows.push(row);
        }

        Ok(Self { header, rows })
    }

    /// Write the table as CSV to any writer.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.header)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer
            .flush()
            .map_err(|e| LinkerError::Csv(e.to_string()))?;
        Ok(())
    }

    /// Write the table as CSV to stdout.
    pub fn print_output(&self) -> Result<()> {
        self.write_csv(io::stdout().lock())
    }

    /// The column names, in order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Index of a column by name, or an error naming the missing column.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| LinkerError::ColumnNotFound(name.to_string()))
    }

    /// Cell value at (row index, column name), if the column exists.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Cell value at (row index, column index).
    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// Append a row. The row is padded/truncated to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.header.len(), String::new());
        self.rows.push(row);
    }

    /// Set a whole column, appending it if it does not exist yet.
    ///
    /// `values` must have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(LinkerError::Csv(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.header.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// All values of a column, in row order.
    pub fn column_values(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r[idx].clone()).collect())
    }

    /// The set of distinct, non-empty values of a column.
    pub fn distinct_values(&self, name: &str) -> Result<HashSet<String>> {
        let idx = self.require_column(name)?;
        Ok(self
            .rows
            .iter()
            .map(|r| r[idx].clone())
            .filter(|v| !v.is_empty())
            .collect())
    }

    /// Remove exactly-duplicate rows, keeping the first occurrence.
    pub fn drop_duplicates(&mut self) {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Remove duplicate candidates within each (column, row) group, keyed by
    /// kg_id and keeping the first occurrence.
    pub fn drop_duplicate_candidates(&mut self) -> Result<()> {
        let col = self.require_column(COLUMN)?;
        let row_col = self.require_column(ROW)?;
        let kg = self.require_column(KG_ID)?;
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        self.rows.retain(|r| {
            seen.insert((r[col].clone(), r[row_col].clone(), r[kg].clone()))
        });
        Ok(())
    }

    /// Row indices grouped by (column, row), in first-appearance order.
    pub fn group_by_cell(&self) -> Result<Vec<((String, String), Vec<usize>)>> {
        let all: Vec<usize> = (0..self.rows.len()).collect();
        self.group_rows(&all)
    }

    /// Group a subset of row indices by (column, row), in first-appearance
    /// order.
    pub fn group_rows(&self, indices: &[usize]) -> Result<Vec<((String, String), Vec<usize>)>> {
        let col = self.require_column(COLUMN)?;
        let row_col = self.require_column(ROW)?;

        let mut order: Vec<(String, String)> = Vec::new();
        let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
        for &i in indices {
            let r = &self.rows[i];
            let key = (r[col].clone(), r[row_col].clone());
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key.clone());
                    Vec::new()
                })
                .push(i);
        }

        Ok(order
            .into_iter()
            .map(|key| {
                let indices = groups.remove(&key).unwrap_or_default();
                (key, indices)
            })
            .collect())
    }

    /// Row indices matching a predicate on one column's value.
    pub fn rows_where(&self, column: &str, predicate: impl Fn(&str) -> bool) -> Result<Vec<usize>> {
        let idx = self.require_column(column)?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| predicate(&r[idx]))
            .map(|(i, _)| i)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_csv() -> &'static str {
        "column,row,kg_id,kg_label,method\n\
         0,0,Q1,one,exact-match\n\
         0,0,Q2,two,exact-match\n\
         0,1,Q3,three,fuzzy-match\n\
         0,0,Q1,one,exact-match\n"
    }

    #[test]
    fn test_read_and_shape() {
        let table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.header().len(), 5);
        assert_eq!(table.get(0, "kg_id"), Some("Q1"));
        assert_eq!(table.get(2, "method"), Some("fuzzy-match"));
    }

    #[test]
    fn test_drop_duplicates_keeps_first() {
        let mut table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        table.drop_duplicates();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0, "kg_id"), Some("Q1"));
    }

    #[test]
    fn test_drop_duplicate_candidates() {
        let csv = "column,row,kg_id\n0,0,Q1\n0,0,Q1\n0,1,Q1\n";
        let mut table = CandidateTable::from_csv_reader(csv.as_bytes()).unwrap();
        table.drop_duplicate_candidates().unwrap();
        // Same kg_id in a different group survives.
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_set_column_appends_and_overwrites() {
        let mut table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        let n = table.len();
        table
            .set_column("votes", vec!["1".to_string(); n])
            .unwrap();
        assert_eq!(table.get(0, "votes"), Some("1"));

        table
            .set_column("votes", vec!["0".to_string(); n])
            .unwrap();
        assert_eq!(table.get(0, "votes"), Some("0"));
        // Overwriting must not add a second column.
        assert_eq!(
            table.header().iter().filter(|h| *h == "votes").count(),
            1
        );
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        let result = table.set_column("votes", vec!["1".to_string()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_group_by_cell_order_and_membership() {
        let table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        let groups = table.group_by_cell().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ("0".to_string(), "0".to_string()));
        assert_eq!(groups[0].1, vec![0, 1, 3]);
        assert_eq!(groups[1].1, vec![2]);
    }

    #[test]
    fn test_distinct_values_skips_empty() {
        let csv = "column,row,kg_id\n0,0,Q1\n0,0,\n0,1,Q1\n";
        let table = CandidateTable::from_csv_reader(csv.as_bytes()).unwrap();
        let distinct = table.distinct_values("kg_id").unwrap();
        assert_eq!(distinct.len(), 1);
        assert!(distinct.contains("Q1"));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();
        assert!(table.column_values("no_such_column").is_err());
    }

    #[test]
    fn test_csv_round_trip_through_file() {
        let table = CandidateTable::from_csv_reader(sample_csv().as_bytes()).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        file.write_all(&buf).unwrap();

        let reloaded = CandidateTable::from_csv_path(file.path()).unwrap();
        assert_eq!(reloaded.len(), table.len());
        assert_eq!(reloaded.header(), table.header());
        assert_eq!(reloaded.get(3, "kg_id"), Some("Q1"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = "column,row,kg_id\n0,0\n";
        let table = CandidateTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.get(0, "kg_id"), Some(""));
    }
}

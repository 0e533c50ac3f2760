use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Cell – a single value in a column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the usual spreadsheet dtypes.
/// Used in `BTreeSet`s downstream (filter selections) so `Cell` must be `Ord`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Missing,
}

// -- Manual Eq/Ord so we can put Cell in BTreeSet --

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Cell::*;
        fn discriminant(v: &Cell) -> u8 {
            match v {
                Missing => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
                Date(_) => 5,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Missing, Missing) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Text(s) => s.hash(state),
            Cell::Integer(i) => i.hash(state),
            Cell::Float(f) => f.to_bits().hash(state),
            Cell::Bool(b) => b.hash(state),
            Cell::Date(d) => d.hash(state),
            Cell::Missing => {}
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v:.4}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Date(_) => write!(f, "{}", self.to_field()),
            Cell::Missing => write!(f, "<missing>"),
        }
    }
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Interpret the value as an `f64` (numeric cells only). `NaN` counts
    /// as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) if v.is_nan() => None,
            Cell::Float(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Canonical flat-text form of the value.
    ///
    /// Floats always keep a decimal point or exponent so they never re-read as
    /// integers; midnight timestamps are written as plain dates.
    pub fn to_field(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Integer(i) => i.to_string(),
            Cell::Float(v) => format!("{v:?}"),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) if d.time() == NaiveTime::MIN => d.format("%Y-%m-%d").to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::Missing => String::new(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Integer(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Cell::Missing, Into::into)
    }
}

// ---------------------------------------------------------------------------
// ColumnType
// ---------------------------------------------------------------------------

/// Semantic type assigned to a column by schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
    Temporal,
    /// No non-missing values, or not yet inferred.
    Unclassified,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "Numeric"),
            ColumnType::Categorical => write!(f, "Categorical"),
            ColumnType::Temporal => write!(f, "Temporal"),
            ColumnType::Unclassified => write!(f, "Unclassified"),
        }
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// A named, typed sequence of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// A column straight from ingestion, before inference has run.
    pub fn raw(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self::new(name, ColumnType::Unclassified, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|c| c.is_missing()).count()
    }

    /// Per-row numeric view; `None` for missing or non-numeric cells.
    pub fn numeric_values(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Cell::as_f64).collect()
    }

    /// Sorted set of distinct values (including `Missing` if present).
    pub fn unique_values(&self) -> BTreeSet<Cell> {
        self.values.iter().cloned().collect()
    }

    /// Fail unless the column has the given type.
    pub fn expect_type(&self, expected: ColumnType) -> Result<()> {
        if self.column_type == expected {
            Ok(())
        } else {
            Err(EngineError::TypeMismatch {
                column: self.name.clone(),
                expected: expected.to_string(),
                actual: self.column_type,
            })
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            column_type: self.column_type,
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// An immutable, rectangular table of uniquely named columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset, checking that names are unique and lengths agree.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(EngineError::DuplicateColumn {
                    name: col.name.clone(),
                });
            }
            if col.len() != row_count {
                return Err(EngineError::LengthMismatch {
                    column: col.name.clone(),
                    expected: row_count,
                    actual: col.len(),
                });
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Assemble columns already known to satisfy the dataset invariants.
    pub(crate) fn from_checked(columns: Vec<Column>, row_count: usize) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == row_count));
        Self { columns, row_count }
    }

    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            row_count: 0,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Dataset::column`] but reports a missing column as an error.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| EngineError::ColumnNotFound {
            name: name.to_string(),
        })
    }

    /// Columns of the given type, in dataset order.
    pub fn columns_of_type(&self, column_type: ColumnType) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(move |c| c.column_type == column_type)
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns_of_type(ColumnType::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns_of_type(ColumnType::Categorical)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Total missing cells across all columns.
    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    /// New dataset holding only the given rows, in the given order.
    /// Every index must be below `row_count()`.
    pub(crate) fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            row_count: rows.len(),
        }
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> Dataset {
        let rows: Vec<usize> = (0..self.row_count.min(n)).collect();
        self.take_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|&v| Cell::from(v)).collect()
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(vec![
            Column::raw("a", text(&["x"])),
            Column::raw("a", text(&["y"])),
        ])
        .unwrap_err();
        assert_eq!(err, EngineError::DuplicateColumn { name: "a".into() });
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            Column::raw("a", text(&["x", "y"])),
            Column::raw("b", text(&["z"])),
        ])
        .unwrap_err();
        assert!(matches!(err, EngineError::LengthMismatch { actual: 1, .. }));
    }

    #[test]
    fn take_rows_keeps_all_columns() {
        let ds = Dataset::new(vec![
            Column::raw("a", text(&["1", "2", "3"])),
            Column::raw("b", text(&["x", "y", "z"])),
        ])
        .unwrap();
        let view = ds.take_rows(&[0, 2]);
        assert_eq!(view.row_count(), 2);
        assert_eq!(view.column_names(), vec!["a", "b"]);
        assert_eq!(view.column("b").unwrap().values, text(&["x", "z"]));
    }

    #[test]
    fn head_stops_at_the_last_row() {
        let ds = Dataset::new(vec![Column::raw("a", text(&["1", "2"]))]).unwrap();
        assert_eq!(ds.head(10).row_count(), 2);
        assert_eq!(ds.head(0).row_count(), 0);
    }

    #[test]
    fn nan_is_not_a_number_value() {
        assert_eq!(Cell::Float(f64::NAN).as_f64(), None);
        assert_eq!(Cell::Float(0.5).as_f64(), Some(0.5));
    }

    #[test]
    fn float_fields_keep_decimal_point() {
        assert_eq!(Cell::Float(2.0).to_field(), "2.0");
        assert_eq!(Cell::Float(1.5).to_field(), "1.5");
        assert_eq!(Cell::Integer(2).to_field(), "2");
        assert_eq!(Cell::Missing.to_field(), "");
    }

    #[test]
    fn midnight_dates_render_as_plain_dates() {
        let d = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(Cell::Date(d).to_field(), "2024-01-15");
        let t = d.date().and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(Cell::Date(t).to_field(), "2024-01-15 13:05:09");
    }

    #[test]
    fn missing_sorts_first() {
        let set: BTreeSet<Cell> = [Cell::from("b"), Cell::Missing, Cell::from("a")]
            .into_iter()
            .collect();
        assert_eq!(set.first(), Some(&Cell::Missing));
    }
}

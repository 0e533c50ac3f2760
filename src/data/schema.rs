//! Schema inference: assigns a [`ColumnType`] to every column and
//! normalises its cells to match.
//!
//! Rules, checked in order over the non-missing cells of a column:
//!
//! 1. no non-missing cells → `Unclassified`
//! 2. every cell is a number (or text that parses as one) → `Numeric`
//! 3. every cell is a date/time (or text that parses as one) → `Temporal`
//! 4. anything else → `Categorical`

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::debug;

use super::model::{Cell, Column, ColumnType, Dataset};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a calendar date or date/time in one of the accepted layouts.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

fn parse_number(s: &str) -> Option<Cell> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Integer(i));
    }
    match s.parse::<f64>() {
        Ok(f) if !f.is_nan() => Some(Cell::Float(f)),
        _ => None,
    }
}

fn as_number(cell: &Cell) -> Option<Cell> {
    match cell {
        Cell::Integer(_) | Cell::Float(_) => Some(cell.clone()),
        Cell::Text(s) => parse_number(s),
        _ => None,
    }
}

fn as_date(cell: &Cell, parse_text: bool) -> Option<NaiveDateTime> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Text(s) if parse_text => parse_datetime(s),
        _ => None,
    }
}

/// Float NaN is treated as missing everywhere.
fn is_absent(cell: &Cell) -> bool {
    match cell {
        Cell::Missing => true,
        Cell::Float(f) => f.is_nan(),
        _ => false,
    }
}

/// Classify a column's values without modifying them.
pub fn infer_column_type(values: &[Cell], parse_dates: bool) -> ColumnType {
    let mut present = values.iter().filter(|c| !is_absent(c)).peekable();
    if present.peek().is_none() {
        return ColumnType::Unclassified;
    }

    let mut is_numeric = true;
    let mut is_temporal = true;
    for cell in present {
        if is_numeric && as_number(cell).is_none() {
            is_numeric = false;
        }
        if is_temporal && as_date(cell, parse_dates).is_none() {
            is_temporal = false;
        }
        if !is_numeric && !is_temporal {
            return ColumnType::Categorical;
        }
    }

    if is_numeric {
        ColumnType::Numeric
    } else {
        ColumnType::Temporal
    }
}

/// Rewrite cells to the canonical representation of `column_type`.
fn normalise(values: &[Cell], column_type: ColumnType, parse_dates: bool) -> Vec<Cell> {
    match column_type {
        ColumnType::Unclassified => vec![Cell::Missing; values.len()],
        ColumnType::Numeric => {
            let numbers: Vec<Cell> = values
                .iter()
                .map(|c| {
                    if is_absent(c) {
                        Cell::Missing
                    } else {
                        as_number(c).unwrap_or(Cell::Missing)
                    }
                })
                .collect();
            // A single fractional value promotes the whole column to floats.
            if numbers.iter().any(|c| matches!(c, Cell::Float(_))) {
                numbers
                    .into_iter()
                    .map(|c| c.as_f64().map_or(Cell::Missing, Cell::Float))
                    .collect()
            } else {
                numbers
            }
        }
        ColumnType::Temporal => values
            .iter()
            .map(|c| as_date(c, parse_dates).map_or(Cell::Missing, Cell::Date))
            .collect(),
        ColumnType::Categorical => values
            .iter()
            .map(|c| {
                if is_absent(c) {
                    Cell::Missing
                } else {
                    Cell::Text(c.to_field())
                }
            })
            .collect(),
    }
}

/// Infer the type of one column and return the typed copy.
pub fn infer_column(column: &Column, parse_dates: bool) -> Column {
    let column_type = infer_column_type(&column.values, parse_dates);
    debug!("inferred column '{}' as {column_type}", column.name);
    Column::new(
        column.name.clone(),
        column_type,
        normalise(&column.values, column_type, parse_dates),
    )
}

/// Infer every column of a freshly ingested dataset.
pub fn infer_schema(dataset: &Dataset) -> Dataset {
    infer_schema_with(dataset, true)
}

/// [`infer_schema`] with control over whether text is tried as dates.
pub fn infer_schema_with(dataset: &Dataset, parse_dates: bool) -> Dataset {
    let columns = dataset
        .columns()
        .iter()
        .map(|c| infer_column(c, parse_dates))
        .collect();
    // Names and lengths are unchanged, so the invariants still hold.
    Dataset::from_checked(columns, dataset.row_count())
}

/// Lenient date coercion: return the column as `Temporal` if it already is,
/// or if it is non-numeric and every present value parses as a date.
pub fn coerce_temporal(column: &Column) -> Option<Column> {
    match column.column_type {
        ColumnType::Temporal => Some(column.clone()),
        ColumnType::Numeric => None,
        ColumnType::Categorical | ColumnType::Unclassified => {
            let mut any = false;
            for cell in column.values.iter().filter(|c| !is_absent(c)) {
                as_date(cell, true)?;
                any = true;
            }
            any.then(|| {
                Column::new(
                    column.name.clone(),
                    ColumnType::Temporal,
                    normalise(&column.values, ColumnType::Temporal, true),
                )
            })
        }
    }
}

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use super::model::{Cell, Column, ColumnType, Dataset};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Filter predicate: the single active row-selection rule
// ---------------------------------------------------------------------------

/// Declarative description of the active filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum FilterSpec {
    /// Keep every row.
    #[default]
    NoFilter,
    /// Keep rows whose numeric value lies in `[min, max]`. Unset bounds
    /// default to the column's own extremes.
    Range {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Keep rows whose value is one of `allowed`.
    /// An empty `allowed` set means no restriction (show all).
    Set {
        column: String,
        allowed: BTreeSet<Cell>,
    },
}

impl FilterSpec {
    pub fn range(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        FilterSpec::Range {
            column: column.into(),
            min,
            max,
        }
    }

    pub fn set<I, C>(column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        FilterSpec::Set {
            column: column.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// The column this filter reads, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            FilterSpec::NoFilter => None,
            FilterSpec::Range { column, .. } | FilterSpec::Set { column, .. } => Some(column),
        }
    }
}

/// What a filter widget can offer for a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterOptions {
    /// Numeric column: slider bounds (`None` when the column has no values).
    Range { bounds: Option<(f64, f64)> },
    /// Any other column: the distinct values to choose from.
    Values(BTreeSet<Cell>),
}

/// Describe the filter choices for `column`.
pub fn filter_options(dataset: &Dataset, column: &str) -> Result<FilterOptions> {
    let col = dataset.require_column(column)?;
    Ok(match col.column_type {
        ColumnType::Numeric => FilterOptions::Range {
            bounds: numeric_bounds(col),
        },
        _ => FilterOptions::Values(col.unique_values()),
    })
}

fn numeric_bounds(col: &Column) -> Option<(f64, f64)> {
    col.values
        .iter()
        .filter_map(Cell::as_f64)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Resolve the effective `[min, max]` of a range filter.
///
/// Returns `Ok(None)` when a bound is unset and the column has no values to
/// default it from.
pub fn resolve_range(
    col: &Column,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Option<(f64, f64)>> {
    col.expect_type(ColumnType::Numeric)?;
    let bounds = numeric_bounds(col);
    let lo = min.or(bounds.map(|b| b.0));
    let hi = max.or(bounds.map(|b| b.1));
    match (lo, hi) {
        (Some(lo), Some(hi)) if lo <= hi => Ok(Some((lo, hi))),
        (Some(lo), Some(hi)) => Err(EngineError::InvalidRange {
            column: col.name.clone(),
            min: lo,
            max: hi,
        }),
        _ => Ok(None),
    }
}

/// Return indices of rows that pass the filter, in original order.
pub fn filtered_indices(dataset: &Dataset, spec: &FilterSpec) -> Result<Vec<usize>> {
    let all = || (0..dataset.row_count()).collect();
    match spec {
        FilterSpec::NoFilter => Ok(all()),
        FilterSpec::Range { column, min, max } => {
            let col = dataset.require_column(column)?;
            let Some((lo, hi)) = resolve_range(col, *min, *max)? else {
                return Ok(Vec::new());
            };
            Ok(col
                .values
                .iter()
                .enumerate()
                .filter(|(_, cell)| cell.as_f64().is_some_and(|v| lo <= v && v <= hi))
                .map(|(i, _)| i)
                .collect())
        }
        FilterSpec::Set { column, allowed } => {
            let col = dataset.require_column(column)?;
            if col.column_type == ColumnType::Numeric {
                return Err(EngineError::TypeMismatch {
                    column: column.clone(),
                    expected: "a non-numeric column".to_string(),
                    actual: col.column_type,
                });
            }
            if allowed.is_empty() {
                // Nothing selected → no restriction
                return Ok(all());
            }
            Ok(col
                .values
                .iter()
                .enumerate()
                .filter(|(_, cell)| allowed.contains(*cell))
                .map(|(i, _)| i)
                .collect())
        }
    }
}

/// Apply the filter, producing a new dataset with the same columns.
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> Result<Dataset> {
    if *spec == FilterSpec::NoFilter {
        return Ok(dataset.clone());
    }
    let rows = filtered_indices(dataset, spec)?;
    debug!(
        "filter {:?} kept {} of {} rows",
        spec,
        rows.len(),
        dataset.row_count()
    );
    Ok(dataset.take_rows(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new(
                "value",
                ColumnType::Numeric,
                vec![Cell::Integer(10), Cell::Integer(20), Cell::Missing, Cell::Integer(30)],
            ),
            Column::new(
                "category",
                ColumnType::Categorical,
                vec![Cell::from("a"), Cell::from("b"), Cell::from("a"), Cell::Missing],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn range_keeps_inclusive_bounds() {
        let ds = sample();
        let spec = FilterSpec::range("value", Some(15.0), Some(30.0));
        assert_eq!(filtered_indices(&ds, &spec).unwrap(), vec![1, 3]);
    }

    #[test]
    fn unset_bounds_default_to_column_extremes() {
        let ds = sample();
        let spec = FilterSpec::range("value", None, Some(20.0));
        assert_eq!(filtered_indices(&ds, &spec).unwrap(), vec![0, 1]);
        // Missing values never fall inside a range.
        let spec = FilterSpec::range("value", None, None);
        assert_eq!(filtered_indices(&ds, &spec).unwrap(), vec![0, 1, 3]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let ds = sample();
        let spec = FilterSpec::range("value", Some(30.0), Some(10.0));
        assert!(matches!(
            apply(&ds, &spec),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn range_on_categorical_fails_fast() {
        let ds = sample();
        let spec = FilterSpec::range("category", Some(0.0), Some(1.0));
        assert!(matches!(
            apply(&ds, &spec),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn empty_selection_keeps_everything() {
        let ds = sample();
        let spec = FilterSpec::set("category", Vec::<Cell>::new());
        assert_eq!(apply(&ds, &spec).unwrap(), ds);
    }

    #[test]
    fn set_matches_members_including_missing() {
        let ds = sample();
        let spec = FilterSpec::set("category", ["a"]);
        assert_eq!(filtered_indices(&ds, &spec).unwrap(), vec![0, 2]);
        let spec = FilterSpec::set("category", [Cell::Missing]);
        assert_eq!(filtered_indices(&ds, &spec).unwrap(), vec![3]);
    }

    #[test]
    fn set_on_numeric_fails_fast() {
        let ds = sample();
        let spec = FilterSpec::set("value", [Cell::Integer(10)]);
        assert!(apply(&ds, &spec).is_err());
    }

    #[test]
    fn unknown_column_is_reported() {
        let ds = sample();
        let spec = FilterSpec::set("nope", ["a"]);
        assert_eq!(
            apply(&ds, &spec).unwrap_err(),
            EngineError::ColumnNotFound { name: "nope".into() }
        );
    }

    #[test]
    fn filter_preserves_columns_and_is_idempotent() {
        let ds = sample();
        let spec = FilterSpec::range("value", Some(15.0), None);
        let once = apply(&ds, &spec).unwrap();
        assert_eq!(once.column_names(), ds.column_names());
        assert_eq!(apply(&once, &spec).unwrap(), once);
    }

    #[test]
    fn options_follow_column_type() {
        let ds = sample();
        assert_eq!(
            filter_options(&ds, "value").unwrap(),
            FilterOptions::Range {
                bounds: Some((10.0, 30.0))
            }
        );
        match filter_options(&ds, "category").unwrap() {
            FilterOptions::Values(v) => assert_eq!(v.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}

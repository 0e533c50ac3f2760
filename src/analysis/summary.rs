//! Descriptive statistics per column: count, mean, spread and quartiles.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::{Cell, Column, ColumnType, Dataset};

/// Location and spread of a numeric column's present values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Distribution {
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 for a single value.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

/// Per-row display emphasis: which cells hold the column's max / min.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ExtremaMarks {
    pub is_max: Vec<bool>,
    pub is_min: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub name: String,
    /// Number of non-missing values.
    pub count: usize,
    /// `None` when the column has no values.
    pub stats: Option<Distribution>,
    pub marks: ExtremaMarks,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub name: String,
    pub count: usize,
    pub unique: usize,
    pub top: Option<Cell>,
    pub freq: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SummaryStats {
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
}

impl SummaryStats {
    pub fn column(&self, name: &str) -> Option<&NumericSummary> {
        self.numeric.iter().find(|s| s.name == name)
    }
}

/// Quantile of already-sorted values using linear interpolation between
/// order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let idx = (sorted.len() - 1) as f64 * q;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;

    if lower == upper || upper >= sorted.len() {
        sorted[lower]
    } else {
        let fraction = idx - lower as f64;
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Describe a set of values; `None` if empty.
pub fn describe(values: &[f64]) -> Option<Distribution> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    // Rounding can push the mean just outside the observed range.
    let mean = (sorted.iter().sum::<f64>() / n as f64).clamp(min, max);
    let std = if n > 1 {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(Distribution {
        mean,
        std,
        min,
        q25: quantile(&sorted, 0.25),
        q50: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max,
    })
}

/// Mark the rows holding the column's largest and smallest values.
pub fn extrema_marks(column: &Column) -> ExtremaMarks {
    let values = column.numeric_values();
    let present = values.iter().flatten();
    let max = present.clone().copied().reduce(f64::max);
    let min = present.copied().reduce(f64::min);

    ExtremaMarks {
        is_max: values.iter().map(|v| v.is_some() && *v == max).collect(),
        is_min: values.iter().map(|v| v.is_some() && *v == min).collect(),
    }
}

fn summarize_numeric(column: &Column) -> NumericSummary {
    let values: Vec<f64> = column.values.iter().filter_map(Cell::as_f64).collect();
    NumericSummary {
        name: column.name.clone(),
        count: values.len(),
        stats: describe(&values),
        marks: extrema_marks(column),
    }
}

fn summarize_categorical(column: &Column) -> CategoricalSummary {
    let mut counts: BTreeMap<&Cell, usize> = BTreeMap::new();
    for cell in column.values.iter().filter(|c| !c.is_missing()) {
        *counts.entry(cell).or_default() += 1;
    }
    // Ties go to the smallest value.
    let mut top: Option<(&Cell, usize)> = None;
    for (cell, n) in &counts {
        if top.map_or(true, |(_, best)| *n > best) {
            top = Some((cell, *n));
        }
    }

    CategoricalSummary {
        name: column.name.clone(),
        count: counts.values().sum(),
        unique: counts.len(),
        top: top.map(|(c, _)| c.clone()),
        freq: top.map_or(0, |(_, n)| n),
    }
}

/// Summaries for every numeric column and every categorical/temporal column.
pub fn summarize(dataset: &Dataset) -> SummaryStats {
    let mut stats = SummaryStats::default();
    for column in dataset.columns() {
        match column.column_type {
            ColumnType::Numeric => stats.numeric.push(summarize_numeric(column)),
            ColumnType::Categorical | ColumnType::Temporal => {
                stats.categorical.push(summarize_categorical(column))
            }
            ColumnType::Unclassified => {}
        }
    }
    stats
}

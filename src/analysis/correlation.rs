use serde::Serialize;

use crate::data::model::{ColumnType, Dataset};
use crate::error::{EngineError, Result};

/// Square, symmetric matrix of Pearson coefficients over numeric columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `values[i][j]` pairs `columns[i]` with `columns[j]`.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }
}

/// Pearson coefficient over the rows where both sides are present.
/// `NaN` when fewer than two such rows exist or either side is constant.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return f64::NAN;
    }
    // Compare raw values: a centred constant column can leave rounding noise.
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|p| p.0 == x0) || pairs.iter().all(|p| p.1 == y0) {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Correlate every numeric column with every other.
pub fn correlate(dataset: &Dataset) -> CorrelationMatrix {
    let names = dataset.numeric_columns();
    build(dataset, &names)
}

/// Correlate an explicit selection of numeric columns.
pub fn correlate_columns(dataset: &Dataset, names: &[String]) -> Result<CorrelationMatrix> {
    if names.is_empty() {
        return Err(EngineError::EmptySelection {
            what: "no columns chosen for correlation".to_string(),
        });
    }
    for name in names {
        dataset
            .require_column(name)?
            .expect_type(ColumnType::Numeric)?;
    }
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    Ok(build(dataset, &names))
}

fn build(dataset: &Dataset, names: &[&str]) -> CorrelationMatrix {
    let series: Vec<Vec<Option<f64>>> = names
        .iter()
        .filter_map(|n| dataset.column(n))
        .map(|c| c.numeric_values())
        .collect();

    let k = series.len();
    let mut values = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        // The diagonal is 1 even for constant columns.
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let r = pearson(&series[i], &series[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: names.iter().map(|n| n.to_string()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;
    use crate::data::model::{Cell, Column};

    fn numeric(name: &str, values: &[Option<f64>]) -> Column {
        Column::new(
            name,
            ColumnType::Numeric,
            values.iter().map(|v| Cell::from(*v)).collect(),
        )
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            numeric("x", &[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]),
            numeric("y", &[Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(10.0)]),
            numeric("z", &[Some(5.0), Some(4.0), Some(3.0), Some(2.0), Some(1.0)]),
            numeric("flat", &[Some(1.0); 5]),
            Column::new("label", ColumnType::Categorical, vec![Cell::from("a"); 5]),
        ])
        .unwrap()
    }

    #[test]
    fn perfect_correlations() {
        let m = correlate(&sample());
        assert_eq!(m.columns, vec!["x", "y", "z", "flat"]);
        assert!((m.get("x", "y").unwrap() - 1.0).abs() < 1e-12);
        assert!((m.get("x", "z").unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_column_is_nan_off_diagonal() {
        let m = correlate(&sample());
        assert_eq!(m.get("flat", "flat"), Some(1.0));
        assert!(m.get("flat", "x").unwrap().is_nan());
        assert!(m.get("y", "flat").unwrap().is_nan());
    }

    #[test]
    fn constant_fractional_column_is_nan() {
        let csv = "rate,x\n0.1,1\n0.1,2\n0.1,4\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let m = correlate(&ds);
        assert!(m.get("rate", "x").unwrap().is_nan());
        assert!(m.get("x", "rate").unwrap().is_nan());
        assert_eq!(m.get("rate", "rate"), Some(1.0));
    }

    #[test]
    fn constant_after_dropping_incomplete_rows_is_nan() {
        let x = [Some(0.3), Some(0.3), Some(9.0)];
        let y = [Some(1.0), Some(2.0), None];
        assert!(pearson(&x, &y).is_nan());
    }

    #[test]
    fn pairwise_complete_rows_only() {
        let x = [Some(1.0), Some(2.0), None, Some(3.0)];
        let y = [Some(1.0), Some(2.0), Some(100.0), Some(3.0)];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_selection_is_an_error() {
        assert!(matches!(
            correlate_columns(&sample(), &[]),
            Err(EngineError::EmptySelection { .. })
        ));
        assert!(matches!(
            correlate_columns(&sample(), &["label".to_string()]),
            Err(EngineError::TypeMismatch { .. })
        ));
        let m = correlate_columns(&sample(), &["z".to_string(), "x".to_string()]).unwrap();
        assert_eq!(m.columns, vec!["z", "x"]);
    }
}

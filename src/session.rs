use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::analysis::correlation::{correlate, correlate_columns, CorrelationMatrix};
use crate::analysis::series::{chart_series, geo_points, ChartSeries, GeoPoint, GeoSpec, PlotSpec};
use crate::analysis::summary::{extrema_marks, summarize, SummaryStats};
use crate::analysis::timeseries::{resample, temporal_columns, TimeSeriesPoint, TimeSeriesSpec};
use crate::data::export::serialize;
use crate::data::filter::{apply, FilterSpec};
use crate::data::model::{Cell, ColumnType, Dataset};
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Selections and outputs
// ---------------------------------------------------------------------------

/// Column selections for the derived views. Unset selections fall back to
/// the first suitable columns; geo is only produced when asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub plot: Option<PlotSpec>,
    pub time_series: Option<TimeSeriesSpec>,
    pub geo: Option<GeoSpec>,
    /// Explicit correlation subset; all numeric columns when `None`.
    pub correlation_columns: Option<Vec<String>>,
    pub preview_rows: usize,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            plot: None,
            time_series: None,
            geo: None,
            correlation_columns: None,
            preview_rows: 5,
        }
    }
}

/// Headline counters for the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    /// Number of distinct column types present.
    pub column_types: usize,
    pub schema: Vec<(String, ColumnType)>,
}

impl Overview {
    pub fn of(dataset: &Dataset) -> Self {
        let schema: Vec<(String, ColumnType)> = dataset
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.column_type))
            .collect();
        let mut types: Vec<ColumnType> = schema.iter().map(|(_, t)| *t).collect();
        types.sort();
        types.dedup();

        Self {
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            missing_cells: dataset.missing_count(),
            column_types: types.len(),
            schema,
        }
    }
}

/// First rows of the dataset with the per-column maximum highlighted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub data: Dataset,
    pub highlight_max: BTreeMap<String, Vec<bool>>,
}

impl Preview {
    pub fn of(dataset: &Dataset, rows: usize) -> Self {
        let data = dataset.head(rows);
        let highlight_max = data
            .columns_of_type(ColumnType::Numeric)
            .map(|c| (c.name.clone(), extrema_marks(c).is_max))
            .collect();
        Self {
            data,
            highlight_max,
        }
    }
}

/// Everything the presentation layer needs for one interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outputs {
    pub overview: Overview,
    pub preview: Preview,
    /// The filter that was actually applied (`NoFilter` after a rejected one).
    pub active_filter: FilterSpec,
    pub view: Dataset,
    pub summary: SummaryStats,
    pub correlation: CorrelationMatrix,
    pub chart: Option<ChartSeries>,
    pub time_series: Option<Vec<TimeSeriesPoint>>,
    pub geo: Option<Vec<GeoPoint>>,
    /// Views that were narrowed or skipped, and why.
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// The pipeline
// ---------------------------------------------------------------------------

fn note(warnings: &mut Vec<String>, context: &str, err: &EngineError) {
    warn!("{context}: {err}");
    warnings.push(format!("{context}: {err}"));
}

/// Apply `filter`, falling back to no filter when it is rejected.
fn filtered_view(
    dataset: &Dataset,
    filter: &FilterSpec,
    warnings: &mut Vec<String>,
) -> (FilterSpec, Dataset) {
    match apply(dataset, filter) {
        Ok(view) => (filter.clone(), view),
        Err(err) => {
            note(warnings, "filter ignored", &err);
            (FilterSpec::NoFilter, dataset.clone())
        }
    }
}

fn default_plot(view: &Dataset) -> Option<PlotSpec> {
    let x = view.columns().first()?.name.clone();
    let y = view.numeric_columns().first()?.to_string();
    Some(PlotSpec {
        x,
        y,
        ..Default::default()
    })
}

fn default_time_series(view: &Dataset) -> std::result::Result<TimeSeriesSpec, EngineError> {
    let date = temporal_columns(view)
        .first()
        .map(|s| s.to_string())
        .ok_or(EngineError::NoTemporalColumn)?;
    let value = view
        .numeric_columns()
        .first()
        .map(|s| s.to_string())
        .ok_or_else(|| EngineError::EmptySelection {
            what: "no numeric column to aggregate".to_string(),
        })?;
    Ok(TimeSeriesSpec {
        date_column: Some(date),
        value_column: value,
        ..Default::default()
    })
}

/// One full, deterministic recomputation pass over an immutable dataset.
///
/// Never fails: each recoverable error narrows or omits one view and is
/// recorded in [`Outputs::warnings`].
pub fn recompute(dataset: &Dataset, filter: &FilterSpec, chart: &ChartSpec) -> Outputs {
    let mut warnings = Vec::new();
    let (active_filter, view) = filtered_view(dataset, filter, &mut warnings);

    let correlation = match &chart.correlation_columns {
        None => correlate(&view),
        Some(columns) => correlate_columns(&view, columns).unwrap_or_else(|err| {
            note(&mut warnings, "correlation", &err);
            CorrelationMatrix::default()
        }),
    };

    let chart_data = chart
        .plot
        .clone()
        .or_else(|| default_plot(&view))
        .and_then(|spec| match chart_series(&view, &spec) {
            Ok(series) => Some(series),
            Err(err) => {
                note(&mut warnings, "chart", &err);
                None
            }
        });

    let ts_spec = match &chart.time_series {
        Some(spec) => Ok(spec.clone()),
        None => default_time_series(&view),
    };
    let time_series = match ts_spec.and_then(|spec| resample(&view, &spec)) {
        Ok(points) => Some(points),
        Err(err) => {
            note(&mut warnings, "time series", &err);
            None
        }
    };

    let geo = chart
        .geo
        .as_ref()
        .and_then(|spec| match geo_points(&view, spec) {
            Ok(points) => Some(points),
            Err(err) => {
                note(&mut warnings, "map", &err);
                None
            }
        });

    debug!(
        "recomputed: {} of {} rows in view, {} warnings",
        view.row_count(),
        dataset.row_count(),
        warnings.len()
    );

    Outputs {
        overview: Overview::of(dataset),
        preview: Preview::of(dataset, chart.preview_rows),
        active_filter,
        summary: summarize(&view),
        correlation,
        chart: chart_data,
        time_series,
        geo,
        view,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One user's analysis state: an owned dataset snapshot and the current
/// filter and chart selections. Sessions never share state.
#[derive(Debug, Clone)]
pub struct Session {
    dataset: Dataset,
    pub filter: FilterSpec,
    pub chart: ChartSpec,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            filter: FilterSpec::NoFilter,
            chart: ChartSpec::default(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Recompute every output for the current selections.
    pub fn outputs(&self) -> Outputs {
        recompute(&self.dataset, &self.filter, &self.chart)
    }

    /// Serialized filtered view. A rejected filter exports everything.
    pub fn export(&self) -> Result<Vec<u8>> {
        let (_, view) = filtered_view(&self.dataset, &self.filter, &mut Vec::new());
        serialize(&view)
    }

    pub fn clear_filter(&mut self) {
        self.filter = FilterSpec::NoFilter;
    }

    pub fn set_range(&mut self, column: &str, min: Option<f64>, max: Option<f64>) {
        self.filter = FilterSpec::range(column, min, max);
    }

    /// Toggle a single value in a column's selection. Switching to a new
    /// column starts a fresh selection holding just that value.
    pub fn toggle_filter_value(&mut self, column: &str, value: &Cell) {
        if let FilterSpec::Set {
            column: current,
            allowed,
        } = &mut self.filter
        {
            if current.as_str() == column {
                if !allowed.remove(value) {
                    allowed.insert(value.clone());
                }
                return;
            }
        }
        self.filter = FilterSpec::set(column, [value.clone()]);
    }

    /// Select every value present in a column.
    pub fn select_all(&mut self, column: &str) -> Result<()> {
        let values = self.dataset.require_column(column)?.unique_values();
        self.filter = FilterSpec::Set {
            column: column.to_string(),
            allowed: values,
        };
        Ok(())
    }

    /// Clear a column's selection, which lifts the restriction.
    pub fn select_none(&mut self, column: &str) {
        self.filter = FilterSpec::Set {
            column: column.to_string(),
            allowed: Default::default(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;

    fn sample() -> Dataset {
        let csv = "date,value,category\n\
                   2024-01-15,10,a\n\
                   2024-01-20,20,b\n\
                   2024-02-01,30,a\n";
        parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap()
    }

    #[test]
    fn default_pass_fills_every_view() {
        let out = recompute(&sample(), &FilterSpec::NoFilter, &ChartSpec::default());
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert_eq!(out.overview.rows, 3);
        assert_eq!(out.overview.column_types, 3);
        assert_eq!(out.view.row_count(), 3);
        assert_eq!(out.correlation.columns, vec!["value"]);
        assert_eq!(out.chart.unwrap().points.len(), 3);
        assert_eq!(out.time_series.unwrap().len(), 2);
        assert!(out.geo.is_none());
        assert_eq!(out.preview.highlight_max["value"], vec![false, false, true]);
    }

    #[test]
    fn inverted_range_falls_back_to_no_filter() {
        let filter = FilterSpec::range("value", Some(30.0), Some(10.0));
        let out = recompute(&sample(), &filter, &ChartSpec::default());
        assert_eq!(out.active_filter, FilterSpec::NoFilter);
        assert_eq!(out.view.row_count(), 3);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn missing_dates_only_drop_the_time_series() {
        let ds = parse_csv(b"k,v\na,1\nb,2\n", &LoadOptions::default()).unwrap();
        let out = recompute(&ds, &FilterSpec::NoFilter, &ChartSpec::default());
        assert!(out.time_series.is_none());
        assert_eq!(out.summary.numeric.len(), 1);
        assert!(out.warnings[0].contains("time series"));
    }

    #[test]
    fn empty_correlation_selection_gives_empty_matrix() {
        let chart = ChartSpec {
            correlation_columns: Some(Vec::new()),
            ..Default::default()
        };
        let out = recompute(&sample(), &FilterSpec::NoFilter, &chart);
        assert!(out.correlation.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn filtered_view_feeds_the_analyses() {
        let filter = FilterSpec::set("category", ["a"]);
        let out = recompute(&sample(), &filter, &ChartSpec::default());
        assert_eq!(out.view.row_count(), 2);
        assert_eq!(out.summary.column("value").unwrap().count, 2);
        // Overview and preview describe the source dataset.
        assert_eq!(out.overview.rows, 3);
        assert_eq!(out.preview.data.row_count(), 3);
    }

    #[test]
    fn toggling_values_edits_the_selection() {
        let mut session = Session::new(sample());
        session.toggle_filter_value("category", &Cell::from("a"));
        assert_eq!(session.outputs().view.row_count(), 2);
        session.toggle_filter_value("category", &Cell::from("b"));
        assert_eq!(session.outputs().view.row_count(), 3);
        session.toggle_filter_value("category", &Cell::from("a"));
        assert_eq!(session.outputs().view.row_count(), 1);

        session.select_none("category");
        assert_eq!(session.outputs().view.row_count(), 3);
        session.select_all("category").unwrap();
        assert_eq!(session.outputs().view.row_count(), 3);
    }

    #[test]
    fn export_uses_the_filtered_view() {
        let mut session = Session::new(sample());
        session.set_range("value", Some(15.0), None);
        let text = String::from_utf8(session.export().unwrap()).unwrap();
        assert_eq!(text, "date,value,category\n2024-01-20,20,b\n2024-02-01,30,a");
    }
}

//! Column projections handed to the chart and map renderers.

use std::str::FromStr;

use serde::Serialize;

use crate::data::model::{Cell, ColumnType, Dataset};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ChartKind {
    #[default]
    Scatter,
    Line,
    Bar,
    Box,
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scatter" => Ok(ChartKind::Scatter),
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "box" => Ok(ChartKind::Box),
            other => Err(format!("unknown chart kind '{other}'")),
        }
    }
}

/// Axis selection for the basic chart.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PlotSpec {
    pub kind: ChartKind,
    /// Any column.
    pub x: String,
    /// Must be numeric.
    pub y: String,
    /// Optional grouping column; must not be numeric.
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: Cell,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub points: Vec<ChartPoint>,
}

/// Points for the basic chart in row order; rows without a `y` are dropped.
pub fn chart_series(dataset: &Dataset, spec: &PlotSpec) -> Result<ChartSeries> {
    let x = dataset.require_column(&spec.x)?;
    let y = dataset.require_column(&spec.y)?;
    y.expect_type(ColumnType::Numeric)?;

    let color = match &spec.color {
        Some(name) => {
            let col = dataset.require_column(name)?;
            if col.column_type == ColumnType::Numeric {
                return Err(EngineError::TypeMismatch {
                    column: name.clone(),
                    expected: ColumnType::Categorical.to_string(),
                    actual: col.column_type,
                });
            }
            Some(col)
        }
        None => None,
    };

    let points = (0..dataset.row_count())
        .filter_map(|row| {
            let value = y.values[row].as_f64()?;
            Some(ChartPoint {
                x: x.values[row].clone(),
                y: value,
                color: color.map(|c| c.values[row].clone()),
            })
        })
        .collect();

    Ok(ChartSeries {
        kind: spec.kind,
        x: spec.x.clone(),
        y: spec.y.clone(),
        color: spec.color.clone(),
        points,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoSpec {
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Coordinates for the map view. Rows missing either coordinate, or outside
/// the valid latitude/longitude ranges, are skipped.
pub fn geo_points(dataset: &Dataset, spec: &GeoSpec) -> Result<Vec<GeoPoint>> {
    let lat = dataset.require_column(&spec.lat)?;
    let lon = dataset.require_column(&spec.lon)?;
    lat.expect_type(ColumnType::Numeric)?;
    lon.expect_type(ColumnType::Numeric)?;

    Ok(lat
        .values
        .iter()
        .zip(&lon.values)
        .filter_map(|(a, b)| Some(GeoPoint { lat: a.as_f64()?, lon: b.as_f64()? }))
        .filter(|p| (-90.0..=90.0).contains(&p.lat) && (-180.0..=180.0).contains(&p.lon))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;

    fn sample() -> Dataset {
        let csv = "city,pop,lat,lon,region\n\
                   A,10,41.0,29.0,west\n\
                   B,,39.9,32.8,east\n\
                   C,30,95.0,10.0,east\n";
        parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap()
    }

    #[test]
    fn drops_rows_without_y() {
        let spec = PlotSpec {
            kind: ChartKind::Bar,
            x: "city".into(),
            y: "pop".into(),
            color: Some("region".into()),
        };
        let series = chart_series(&sample(), &spec).unwrap();
        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[1].x, Cell::from("C"));
        assert_eq!(series.points[1].color, Some(Cell::from("east")));
    }

    #[test]
    fn y_must_be_numeric_and_color_must_not() {
        let ds = sample();
        let bad_y = PlotSpec {
            x: "pop".into(),
            y: "city".into(),
            ..Default::default()
        };
        assert!(chart_series(&ds, &bad_y).is_err());
        let bad_color = PlotSpec {
            x: "city".into(),
            y: "pop".into(),
            color: Some("lat".into()),
            ..Default::default()
        };
        assert!(chart_series(&ds, &bad_color).is_err());
    }

    #[test]
    fn geo_skips_out_of_range_coordinates() {
        let spec = GeoSpec {
            lat: "lat".into(),
            lon: "lon".into(),
        };
        let points = geo_points(&sample(), &spec).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], GeoPoint { lat: 41.0, lon: 29.0 });
    }
}

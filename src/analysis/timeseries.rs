//! Calendar resampling: group a numeric column by the period of a date
//! column and reduce each group to one value.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Serialize, Serializer};

use crate::data::model::{ColumnType, Dataset};
use crate::data::schema::coerce_temporal;
use crate::error::{EngineError, Result};

/// Calendar truncation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub enum Granularity {
    Day,
    /// Weeks start on Monday.
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d" | "day" => Ok(Granularity::Day),
            "w" | "week" => Ok(Granularity::Week),
            "m" | "month" => Ok(Granularity::Month),
            "q" | "quarter" => Ok(Granularity::Quarter),
            "y" | "year" => Ok(Granularity::Year),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

/// How the values inside one period are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
    Count,
    Min,
    Max,
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" | "avg" => Ok(Aggregation::Mean),
            "sum" => Ok(Aggregation::Sum),
            "count" => Ok(Aggregation::Count),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => Err(format!("unknown aggregation '{other}'")),
        }
    }
}

impl Aggregation {
    /// Reduce a group. Empty groups give `NaN` except for sum and count.
    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Count => values.len() as f64,
            _ if values.is_empty() => f64::NAN,
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One calendar period, identified by its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarPeriod {
    pub start: NaiveDate,
    pub granularity: Granularity,
}

impl CalendarPeriod {
    /// The period of `granularity` containing `at`.
    pub fn containing(at: NaiveDateTime, granularity: Granularity) -> Self {
        let date = at.date();
        let start = match granularity {
            Granularity::Day => date,
            Granularity::Week => {
                date - Days::new(date.weekday().num_days_from_monday() as u64)
            }
            Granularity::Month => date - Days::new(date.day0() as u64),
            Granularity::Quarter => {
                let first_month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), first_month, 1)
                    .unwrap_or_else(|| date - Days::new(date.day0() as u64))
            }
            Granularity::Year => date - Days::new(date.ordinal0() as u64),
        };
        Self { start, granularity }
    }
}

impl fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.start;
        match self.granularity {
            Granularity::Day => write!(f, "{}", d.format("%Y-%m-%d")),
            Granularity::Week => {
                let end = d + Days::new(6);
                write!(f, "{}/{}", d.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            Granularity::Month => write!(f, "{}", d.format("%Y-%m")),
            Granularity::Quarter => write!(f, "{}Q{}", d.year(), d.month0() / 3 + 1),
            Granularity::Year => write!(f, "{}", d.year()),
        }
    }
}

impl Serialize for CalendarPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub period: CalendarPeriod,
    pub value: f64,
}

/// What to resample. Without a date column the first usable one is taken.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimeSeriesSpec {
    pub date_column: Option<String>,
    pub value_column: String,
    pub granularity: Granularity,
    pub aggregation: Aggregation,
}

/// Columns usable as a date axis: temporal ones plus text columns that
/// parse entirely as dates.
pub fn temporal_columns(dataset: &Dataset) -> Vec<&str> {
    dataset
        .columns()
        .iter()
        .filter(|c| coerce_temporal(c).is_some())
        .map(|c| c.name.as_str())
        .collect()
}

/// Mean of `value_column` per `granularity` period of `temporal_column`,
/// sorted by period.
pub fn aggregate_by_period(
    dataset: &Dataset,
    temporal_column: &str,
    value_column: &str,
    granularity: Granularity,
) -> Result<Vec<TimeSeriesPoint>> {
    aggregate(
        dataset,
        temporal_column,
        value_column,
        granularity,
        Aggregation::Mean,
    )
}

/// Resample according to a [`TimeSeriesSpec`].
pub fn resample(dataset: &Dataset, spec: &TimeSeriesSpec) -> Result<Vec<TimeSeriesPoint>> {
    let date_column = match &spec.date_column {
        Some(name) => name.as_str(),
        None => temporal_columns(dataset)
            .first()
            .copied()
            .ok_or(EngineError::NoTemporalColumn)?,
    };
    aggregate(
        dataset,
        date_column,
        &spec.value_column,
        spec.granularity,
        spec.aggregation,
    )
}

/// Group rows by period and reduce each group. Rows without a date are
/// dropped; a period whose values are all missing still appears.
pub fn aggregate(
    dataset: &Dataset,
    temporal_column: &str,
    value_column: &str,
    granularity: Granularity,
    aggregation: Aggregation,
) -> Result<Vec<TimeSeriesPoint>> {
    let values = dataset.require_column(value_column)?;
    values.expect_type(ColumnType::Numeric)?;

    let dates = dataset.require_column(temporal_column)?;
    let Some(dates) = coerce_temporal(dates) else {
        if temporal_columns(dataset).is_empty() {
            return Err(EngineError::NoTemporalColumn);
        }
        return Err(EngineError::TypeMismatch {
            column: temporal_column.to_string(),
            expected: ColumnType::Temporal.to_string(),
            actual: dates.column_type,
        });
    };

    let mut groups: BTreeMap<CalendarPeriod, Vec<f64>> = BTreeMap::new();
    for (date, value) in dates.values.iter().zip(&values.values) {
        let Some(at) = date.as_datetime() else {
            continue;
        };
        let group = groups
            .entry(CalendarPeriod::containing(at, granularity))
            .or_default();
        if let Some(v) = value.as_f64() {
            group.push(v);
        }
    }

    debug!(
        "resampled '{value_column}' by {granularity:?} of '{temporal_column}': {} periods",
        groups.len()
    );

    Ok(groups
        .into_iter()
        .map(|(period, vals)| TimeSeriesPoint {
            period,
            value: aggregation.reduce(&vals),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;
    use crate::data::model::{Cell, Column};

    fn at(s: &str) -> NaiveDateTime {
        crate::data::schema::parse_datetime(s).unwrap()
    }

    #[test]
    fn monthly_mean() {
        let csv = "date,value\n2024-01-15,10\n2024-01-20,20\n2024-02-01,30\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let points = aggregate_by_period(&ds, "date", "value", Granularity::Month).unwrap();
        let got: Vec<(String, f64)> = points
            .iter()
            .map(|p| (p.period.to_string(), p.value))
            .collect();
        assert_eq!(
            got,
            vec![("2024-01".to_string(), 15.0), ("2024-02".to_string(), 30.0)]
        );
    }

    #[test]
    fn output_is_sorted_without_gap_filling() {
        let csv = "date,value\n2024-05-02,1\n2023-11-30,2\n2024-05-09,3\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let points = aggregate_by_period(&ds, "date", "value", Granularity::Month).unwrap();
        let labels: Vec<String> = points.iter().map(|p| p.period.to_string()).collect();
        assert_eq!(labels, vec!["2023-11", "2024-05"]);
    }

    #[test]
    fn truncates_to_each_granularity() {
        let t = at("2024-08-14 17:45:00"); // a Wednesday
        let label = |g| CalendarPeriod::containing(t, g).to_string();
        assert_eq!(label(Granularity::Day), "2024-08-14");
        assert_eq!(label(Granularity::Week), "2024-08-12/2024-08-18");
        assert_eq!(label(Granularity::Month), "2024-08");
        assert_eq!(label(Granularity::Quarter), "2024Q3");
        assert_eq!(label(Granularity::Year), "2024");
    }

    #[test]
    fn coerces_text_dates_when_parsing_was_off() {
        let opts = LoadOptions {
            parse_dates: false,
            ..Default::default()
        };
        let csv = "date,value\n2024-01-15,1\n2024-01-16,3\n";
        let ds = parse_csv(csv.as_bytes(), &opts).unwrap();
        assert_eq!(ds.column("date").unwrap().column_type, ColumnType::Categorical);
        let points = aggregate_by_period(&ds, "date", "value", Granularity::Month).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 2.0);
    }

    #[test]
    fn missing_values_and_dates_are_skipped() {
        let ds = Dataset::new(vec![
            Column::new(
                "d",
                ColumnType::Temporal,
                vec![
                    Cell::Date(at("2024-01-01")),
                    Cell::Missing,
                    Cell::Date(at("2024-01-31")),
                    Cell::Date(at("2024-02-10")),
                ],
            ),
            Column::new(
                "v",
                ColumnType::Numeric,
                vec![Cell::Float(1.0), Cell::Float(100.0), Cell::Missing, Cell::Missing],
            ),
        ])
        .unwrap();
        let points = aggregate_by_period(&ds, "d", "v", Granularity::Month).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 1.0);
        assert!(points[1].value.is_nan());

        let counts = aggregate(&ds, "d", "v", Granularity::Month, Aggregation::Count).unwrap();
        assert_eq!(counts[1].value, 0.0);
    }

    #[test]
    fn no_temporal_column_is_reported() {
        let csv = "name,value\na,1\nb,2\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert_eq!(
            aggregate_by_period(&ds, "name", "value", Granularity::Month).unwrap_err(),
            EngineError::NoTemporalColumn
        );
        let spec = TimeSeriesSpec {
            value_column: "value".into(),
            ..Default::default()
        };
        assert_eq!(resample(&ds, &spec).unwrap_err(), EngineError::NoTemporalColumn);
    }

    #[test]
    fn value_column_must_be_numeric() {
        let csv = "date,label\n2024-01-15,x\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        assert!(matches!(
            aggregate_by_period(&ds, "date", "label", Granularity::Month),
            Err(EngineError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn parses_names() {
        assert_eq!("Q".parse::<Granularity>().unwrap(), Granularity::Quarter);
        assert_eq!("sum".parse::<Aggregation>().unwrap(), Aggregation::Sum);
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}

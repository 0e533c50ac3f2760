//! Tabular analytics engine.
//!
//! Loads a table, infers what each column holds, and derives the views an
//! exploration dashboard shows: a filtered table, descriptive statistics, a
//! correlation matrix, calendar-resampled series and a CSV export.
//!
//! ```
//! use tabular_lens::config::LoadOptions;
//! use tabular_lens::data::filter::FilterSpec;
//! use tabular_lens::data::loader::parse_csv;
//! use tabular_lens::session::{recompute, ChartSpec};
//!
//! let csv = "date,value\n2024-01-15,10\n2024-01-20,20\n2024-02-01,30\n";
//! let dataset = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
//!
//! let filter = FilterSpec::range("value", Some(15.0), None);
//! let out = recompute(&dataset, &filter, &ChartSpec::default());
//! assert_eq!(out.view.row_count(), 2);
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod session;

pub use data::model::{Cell, Column, ColumnType, Dataset};
pub use error::EngineError;

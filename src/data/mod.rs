/// Data layer: core types, loading, inference, filtering and export.
///
/// Architecture:
/// ```text
///  .csv / .xlsx / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → raw Dataset (untyped cells)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  schema   │  infer ColumnType per column, normalise cells
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply the active FilterSpec → filtered Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  filtered Dataset → CSV bytes
///   └──────────┘
/// ```

pub mod arrow_bridge;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod schema;

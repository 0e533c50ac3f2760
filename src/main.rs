use std::path::PathBuf;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, ValueEnum};
use log::info;
use serde::Serialize;

use tabular_lens::analysis::correlation::CorrelationMatrix;
use tabular_lens::analysis::series::{ChartKind, ChartSeries, GeoPoint, GeoSpec, PlotSpec};
use tabular_lens::analysis::summary::SummaryStats;
use tabular_lens::analysis::timeseries::{Aggregation, Granularity, TimeSeriesPoint, TimeSeriesSpec};
use tabular_lens::config::LoadOptions;
use tabular_lens::data::arrow_bridge::to_record_batch;
use tabular_lens::data::filter::FilterSpec;
use tabular_lens::data::loader::load_file;
use tabular_lens::data::schema::parse_datetime;
use tabular_lens::session::{ChartSpec, Outputs, Overview, Preview, Session};
use tabular_lens::{Cell, ColumnType, Dataset};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Table,
}

/// Inspect a tabular data file: schema, filtering, statistics, correlations
/// and time series.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data file (.csv, .tsv, .xlsx, .parquet, .json)
    file: PathBuf,

    /// JSON file with load options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worksheet to read from a workbook
    #[arg(long)]
    sheet: Option<String>,

    /// Column to filter on
    #[arg(long)]
    filter_column: Option<String>,

    /// Lower bound for a numeric filter
    #[arg(long, allow_hyphen_values = true)]
    min: Option<f64>,

    /// Upper bound for a numeric filter
    #[arg(long, allow_hyphen_values = true)]
    max: Option<f64>,

    /// Comma-separated values to keep for a non-numeric filter
    #[arg(long, value_delimiter = ',')]
    values: Vec<String>,

    /// Chart x axis column
    #[arg(long)]
    x: Option<String>,

    /// Chart y axis column (numeric)
    #[arg(long)]
    y: Option<String>,

    /// Chart colour column (categorical)
    #[arg(long)]
    color: Option<String>,

    #[arg(long, default_value = "scatter")]
    kind: ChartKind,

    /// Date column for the time series
    #[arg(long)]
    date_column: Option<String>,

    /// Numeric column for the time series
    #[arg(long)]
    value_column: Option<String>,

    #[arg(long, default_value = "month")]
    granularity: Granularity,

    #[arg(long, default_value = "mean")]
    aggregation: Aggregation,

    /// Latitude column for the map
    #[arg(long)]
    lat: Option<String>,

    /// Longitude column for the map
    #[arg(long)]
    lon: Option<String>,

    /// Comma-separated numeric columns to correlate
    #[arg(long, value_delimiter = ',')]
    corr_columns: Option<Vec<String>>,

    #[arg(long, default_value_t = 5)]
    preview_rows: usize,

    /// Write the filtered rows as CSV to this path
    #[arg(long)]
    export: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

/// Turn raw `--values` into cells comparable with the column's contents.
fn selection_cells(dataset: &Dataset, column: &str, raw: &[String]) -> Vec<Cell> {
    let column_type = dataset
        .column(column)
        .map_or(ColumnType::Categorical, |c| c.column_type);
    raw.iter()
        .map(|v| match column_type {
            _ if v.is_empty() => Cell::Missing,
            ColumnType::Temporal => {
                parse_datetime(v).map_or_else(|| Cell::from(v.as_str()), Cell::Date)
            }
            _ => Cell::from(v.as_str()),
        })
        .collect()
}

fn build_filter(args: &Args, dataset: &Dataset) -> FilterSpec {
    let Some(column) = &args.filter_column else {
        return FilterSpec::NoFilter;
    };
    if args.min.is_some() || args.max.is_some() {
        FilterSpec::range(column.clone(), args.min, args.max)
    } else {
        FilterSpec::set(column.clone(), selection_cells(dataset, column, &args.values))
    }
}

fn build_chart(args: &Args) -> ChartSpec {
    let plot = match (&args.x, &args.y) {
        (Some(x), Some(y)) => Some(PlotSpec {
            kind: args.kind,
            x: x.clone(),
            y: y.clone(),
            color: args.color.clone(),
        }),
        _ => None,
    };
    let time_series = args.value_column.as_ref().map(|value| TimeSeriesSpec {
        date_column: args.date_column.clone(),
        value_column: value.clone(),
        granularity: args.granularity,
        aggregation: args.aggregation,
    });
    let geo = match (&args.lat, &args.lon) {
        (Some(lat), Some(lon)) => Some(GeoSpec {
            lat: lat.clone(),
            lon: lon.clone(),
        }),
        _ => None,
    };
    ChartSpec {
        plot,
        time_series,
        geo,
        correlation_columns: args.corr_columns.clone(),
        preview_rows: args.preview_rows,
    }
}

/// JSON report: every output except the full filtered table.
#[derive(Serialize)]
struct Report<'a> {
    overview: &'a Overview,
    active_filter: &'a FilterSpec,
    view_rows: usize,
    preview: &'a Preview,
    summary: &'a SummaryStats,
    correlation: &'a CorrelationMatrix,
    chart: &'a Option<ChartSeries>,
    time_series: &'a Option<Vec<TimeSeriesPoint>>,
    geo: &'a Option<Vec<GeoPoint>>,
    warnings: &'a [String],
}

fn print_json(out: &Outputs) -> Result<()> {
    let report = Report {
        overview: &out.overview,
        active_filter: &out.active_filter,
        view_rows: out.view.row_count(),
        preview: &out.preview,
        summary: &out.summary,
        correlation: &out.correlation,
        chart: &out.chart,
        time_series: &out.time_series,
        geo: &out.geo,
        warnings: &out.warnings,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn fmt_num(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.4}")
    }
}

fn print_table(out: &Outputs) -> Result<()> {
    let o = &out.overview;
    println!(
        "{} rows, {} columns, {} missing cells, {} column types",
        o.rows, o.columns, o.missing_cells, o.column_types
    );
    for (name, ty) in &o.schema {
        println!("  {name}: {ty}");
    }

    println!("\nPreview:");
    let batch = to_record_batch(&out.preview.data)?;
    println!("{}", pretty_format_batches(&[batch]).context("formatting preview")?);

    println!("\nFilter: {:?} ({} rows)", out.active_filter, out.view.row_count());

    println!("\nSummary:");
    println!(
        "{:<20} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in &out.summary.numeric {
        match s.stats {
            Some(d) => println!(
                "{:<20} {:>8} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12} {:>12}",
                s.name,
                s.count,
                fmt_num(d.mean),
                fmt_num(d.std),
                fmt_num(d.min),
                fmt_num(d.q25),
                fmt_num(d.q50),
                fmt_num(d.q75),
                fmt_num(d.max)
            ),
            None => println!("{:<20} {:>8}", s.name, s.count),
        }
    }
    for c in &out.summary.categorical {
        let top = c.top.as_ref().map(ToString::to_string).unwrap_or_default();
        println!(
            "{:<20} {:>8} unique={} top={} freq={}",
            c.name, c.count, c.unique, top, c.freq
        );
    }

    if !out.correlation.is_empty() {
        println!("\nCorrelation:");
        print!("{:<20}", "");
        for name in &out.correlation.columns {
            print!(" {name:>12}");
        }
        println!();
        for (name, row) in out.correlation.columns.iter().zip(&out.correlation.values) {
            print!("{name:<20}");
            for v in row {
                print!(" {:>12}", fmt_num(*v));
            }
            println!();
        }
    }

    if let Some(points) = &out.time_series {
        println!("\nTime series:");
        for p in points {
            println!("  {:<24} {}", p.period.to_string(), fmt_num(p.value));
        }
    }

    if let Some(chart) = &out.chart {
        println!(
            "\nChart: {:?} of {} by {} ({} points)",
            chart.kind,
            chart.y,
            chart.x,
            chart.points.len()
        );
    }
    if let Some(geo) = &out.geo {
        println!("Map: {} points", geo.len());
    }

    for w in &out.warnings {
        println!("warning: {w}");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => LoadOptions::from_file(path)?,
        None => LoadOptions::default(),
    };
    if args.sheet.is_some() {
        options.sheet = args.sheet.clone();
    }

    let dataset = load_file(&args.file, &options)
        .with_context(|| format!("loading {}", args.file.display()))?;

    let mut session = Session::new(dataset);
    session.filter = build_filter(&args, session.dataset());
    session.chart = build_chart(&args);

    let out = session.outputs();
    match args.format {
        Format::Json => print_json(&out)?,
        Format::Table => print_table(&out)?,
    }

    if let Some(path) = &args.export {
        let bytes = session.export()?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        info!("exported {} rows to {}", out.view.row_count(), path.display());
    }
    Ok(())
}

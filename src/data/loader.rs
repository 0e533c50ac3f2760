use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::arrow_bridge::dataset_from_batches;
use super::model::{Cell, Column, Dataset};
use super::schema::{infer_schema_with, parse_datetime};
use crate::config::LoadOptions;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a dataset from a file and infer its schema.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.tsv` / `.txt` – delimited text, first row is the header
/// * `.xlsx` / `.xlsm` / `.xls` – first (or configured) worksheet
/// * `.parquet` – any flat Parquet file
/// * `.json`    – `[{ "col": value, ... }, ...]`
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let raw = match ext.as_str() {
        "csv" | "txt" => {
            let file = std::fs::File::open(path).context("opening CSV")?;
            read_delimited(file, options)?
        }
        "tsv" => {
            let file = std::fs::File::open(path).context("opening TSV")?;
            let tsv = LoadOptions {
                delimiter: '\t',
                ..options.clone()
            };
            read_delimited(file, &tsv)?
        }
        "xlsx" | "xlsm" | "xls" => load_excel(path, options)?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path, options)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let dataset = infer_schema_with(&raw, options.parse_dates);
    info!(
        "loaded {}: {} rows x {} columns",
        path.display(),
        dataset.row_count(),
        dataset.column_count()
    );
    Ok(dataset)
}

/// Parse delimited text held in memory and infer its schema.
pub fn parse_csv(bytes: &[u8], options: &LoadOptions) -> Result<Dataset> {
    let raw = read_delimited(bytes, options)?;
    Ok(infer_schema_with(&raw, options.parse_dates))
}

// ---------------------------------------------------------------------------
// Header clean-up
// ---------------------------------------------------------------------------

/// Blank headers become `Unnamed: {i}`; repeats get a `.1`, `.2`, … suffix.
pub fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut taken: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {i}")
        } else {
            name
        };
        let mut candidate = base.clone();
        while taken.contains(&candidate) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{base}.{n}");
        }
        taken.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

fn columns_from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Dataset> {
    let mut columns: Vec<Vec<Cell>> = vec![Vec::with_capacity(rows.len()); headers.len()];
    for row in rows {
        for (col, cell) in columns.iter_mut().zip(row) {
            col.push(cell);
        }
    }
    let columns = unique_headers(headers)
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::raw(name, values))
        .collect();
    Dataset::new(columns).context("assembling dataset")
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Every field is kept as text (or `Missing`); typing happens in inference.
fn read_delimited<R: Read>(source: R, options: &LoadOptions) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .map(|field| {
                if options.is_na(field) {
                    Cell::Missing
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    columns_from_rows(headers, rows)
}

// ---------------------------------------------------------------------------
// Excel loader
// ---------------------------------------------------------------------------

fn load_excel(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = match &options.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .context("Workbook contains no sheets")?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_string()).collect(),
        None => return Ok(Dataset::empty()),
    };
    let body = rows
        .map(|row| row.iter().map(|c| excel_cell(c, options)).collect())
        .collect();

    columns_from_rows(headers, body)
}

fn excel_cell(cell: &Data, options: &LoadOptions) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::String(s) if options.is_na(s) => Cell::Missing,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Float(*f),
        Data::Int(i) => Cell::Integer(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Missing, Cell::Date),
        Data::DateTimeIso(s) => parse_datetime(s).map_or_else(|| Cell::Text(s.clone()), Cell::Date),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet file; nested columns are rendered as text.
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("building parquet reader")?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("reading parquet record batch")?;

    dataset_from_batches(&schema, &batches)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (an array of objects). Columns appear in
/// order of first occurrence; a key absent from a record is missing there.
fn load_json(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map_or(Cell::Missing, |v| json_to_cell(v, options)))
                .collect()
        })
        .collect();

    columns_from_rows(headers, rows)
}

fn json_to_cell(val: &JsonValue, options: &LoadOptions) -> Cell {
    match val {
        JsonValue::String(s) if options.is_na(s) => Cell::Missing,
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Missing,
        other => Cell::Text(other.to_string()),
    }
}

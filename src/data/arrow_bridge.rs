//! Bridge between [`Dataset`] and Arrow record batches.
//!
//! Used by the Parquet loader on the way in and by the table printer and
//! sample generator on the way out.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Field, Float32Type, Float64Type, Int16Type, Int32Type,
    Int64Type, Int8Type, Schema, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::array_value_to_string;

use super::model::{Cell, Column, ColumnType, Dataset};

// ---------------------------------------------------------------------------
// Arrow → Dataset
// ---------------------------------------------------------------------------

/// Flatten record batches into raw (not yet inferred) columns.
pub fn dataset_from_batches(schema: &Schema, batches: &[RecordBatch]) -> Result<Dataset> {
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let values = batches
                .iter()
                .flat_map(|batch| {
                    let col = batch.column(idx);
                    (0..batch.num_rows()).map(move |row| extract_cell(col, row))
                })
                .collect();
            Column::raw(field.name().clone(), values)
        })
        .collect();

    Dataset::new(columns).context("assembling dataset from record batches")
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Missing;
    }
    match col.data_type() {
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Boolean => Cell::Bool(col.as_boolean().value(row)),
        DataType::Int8 => Cell::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => Cell::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => Cell::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Cell::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Cell::Integer(col.as_primitive::<UInt8Type>().value(row) as i64),
        DataType::UInt16 => Cell::Integer(col.as_primitive::<UInt16Type>().value(row) as i64),
        DataType::UInt32 => Cell::Integer(col.as_primitive::<UInt32Type>().value(row) as i64),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Integer)
        }
        DataType::Float32 => Cell::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Cell::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Date32 => date_cell(col.as_primitive::<Date32Type>().value_as_datetime(row)),
        DataType::Date64 => date_cell(col.as_primitive::<Date64Type>().value_as_datetime(row)),
        DataType::Timestamp(unit, _) => date_cell(match unit {
            TimeUnit::Second => col
                .as_primitive::<TimestampSecondType>()
                .value_as_datetime(row),
            TimeUnit::Millisecond => col
                .as_primitive::<TimestampMillisecondType>()
                .value_as_datetime(row),
            TimeUnit::Microsecond => col
                .as_primitive::<TimestampMicrosecondType>()
                .value_as_datetime(row),
            TimeUnit::Nanosecond => col
                .as_primitive::<TimestampNanosecondType>()
                .value_as_datetime(row),
        }),
        _ => array_value_to_string(col, row).map_or(Cell::Missing, Cell::Text),
    }
}

fn date_cell(value: Option<chrono::NaiveDateTime>) -> Cell {
    value.map_or(Cell::Missing, Cell::Date)
}

// ---------------------------------------------------------------------------
// Dataset → Arrow
// ---------------------------------------------------------------------------

/// Convert a typed dataset into a single record batch.
///
/// Numeric columns become `Int64` when every value is an integer and
/// `Float64` otherwise; temporal columns become microsecond timestamps; all
/// other columns become strings.
pub fn to_record_batch(dataset: &Dataset) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(dataset.column_count());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.column_count());

    for col in dataset.columns() {
        let (data_type, array) = column_to_array(col);
        fields.push(Field::new(col.name.clone(), data_type, true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(dataset.row_count()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .context("building record batch")
}

fn column_to_array(col: &Column) -> (DataType, ArrayRef) {
    match col.column_type {
        ColumnType::Numeric
            if col
                .values
                .iter()
                .all(|c| matches!(c, Cell::Integer(_) | Cell::Missing)) =>
        {
            let values: Vec<Option<i64>> = col
                .values
                .iter()
                .map(|c| match c {
                    Cell::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(Int64Array::from(values)))
        }
        ColumnType::Numeric => {
            let values: Vec<Option<f64>> = col.numeric_values();
            (DataType::Float64, Arc::new(Float64Array::from(values)))
        }
        ColumnType::Temporal => {
            let values: Vec<Option<i64>> = col
                .values
                .iter()
                .map(|c| c.as_datetime().map(|d| d.and_utc().timestamp_micros()))
                .collect();
            (
                DataType::Timestamp(TimeUnit::Microsecond, None),
                Arc::new(TimestampMicrosecondArray::from(values)),
            )
        }
        ColumnType::Categorical | ColumnType::Unclassified => {
            let values: Vec<Option<String>> = col
                .values
                .iter()
                .map(|c| (!c.is_missing()).then(|| c.to_field()))
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(values)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;
    use crate::data::schema::infer_schema;

    #[test]
    fn record_batch_round_trip_preserves_types() {
        let csv = "when,count,price,label\n2024-01-15,1,2.5,a\n2024-03-01 12:00:00,,3.0,\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();

        let batch = to_record_batch(&ds).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
        assert_eq!(batch.schema().field(2).data_type(), &DataType::Float64);

        let back = infer_schema(&dataset_from_batches(&batch.schema(), &[batch]).unwrap());
        assert_eq!(back, ds);
    }

    #[test]
    fn empty_dataset_converts() {
        let batch = to_record_batch(&Dataset::empty()).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
    }
}

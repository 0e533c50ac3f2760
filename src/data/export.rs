use csv::{QuoteStyle, Terminator, WriterBuilder};

use super::model::Dataset;
use crate::error::{EngineError, Result};

/// Serialize a dataset as comma-separated UTF-8 text.
///
/// The header row holds the column names, missing cells are empty fields and
/// the final row carries no trailing newline. Values are written in their
/// canonical field form so that loading the bytes back reproduces the same
/// values and inferred types.
pub fn serialize(dataset: &Dataset) -> Result<Vec<u8>> {
    if dataset.column_count() == 0 {
        return Ok(Vec::new());
    }

    // A lone empty field would otherwise be an empty line, which readers skip.
    let quote_style = if dataset.column_count() == 1 {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };

    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .quote_style(quote_style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(dataset.column_names())?;
    for row in 0..dataset.row_count() {
        writer.write_record(
            dataset
                .columns()
                .iter()
                .map(|col| col.values[row].to_field()),
        )?;
    }

    let mut bytes = writer
        .into_inner()
        .map_err(|e| EngineError::Export(e.to_string()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadOptions;
    use crate::data::loader::parse_csv;
    use crate::data::model::{Cell, Column, ColumnType};

    #[test]
    fn writes_header_and_rows_without_trailing_newline() {
        let ds = Dataset::new(vec![
            Column::new("n", ColumnType::Numeric, vec![Cell::Integer(1), Cell::Missing]),
            Column::new(
                "s",
                ColumnType::Categorical,
                vec![Cell::from("a,b"), Cell::from("say \"hi\"")],
            ),
        ])
        .unwrap();
        let text = String::from_utf8(serialize(&ds).unwrap()).unwrap();
        assert_eq!(text, "n,s\n1,\"a,b\"\n,\"say \"\"hi\"\"\"");
    }

    #[test]
    fn round_trips_through_the_loader() {
        let csv = "day,qty,price,tag\n2024-01-15,3,1.0,x\n2024-02-01 08:30:00,,2.25,\n";
        let ds = parse_csv(csv.as_bytes(), &LoadOptions::default()).unwrap();
        let back = parse_csv(&serialize(&ds).unwrap(), &LoadOptions::default()).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn single_column_with_missing_keeps_its_rows() {
        let ds = Dataset::new(vec![Column::new(
            "only",
            ColumnType::Categorical,
            vec![Cell::from("a"), Cell::Missing, Cell::from("b")],
        )])
        .unwrap();
        let back = parse_csv(&serialize(&ds).unwrap(), &LoadOptions::default()).unwrap();
        assert_eq!(back.row_count(), 3);
        assert_eq!(back, ds);
    }
}

use crate::error::ExportError;
use crate::format::cell_text;
use polars::prelude::*;
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;

/// Builds a string-typed frame from preview rows; nulls and missing keys stay null.
pub fn rows_to_dataframe(
    columns: &[String],
    rows: &[&Map<String, Value>],
) -> PolarsResult<DataFrame> {
    let cols: Vec<Column> = columns
        .iter()
        .map(|name| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| match row.get(name) {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(cell_text(v)),
                })
                .collect();
            Column::new(PlSmallStr::from(name.as_str()), values)
        })
        .collect();
    DataFrame::new(cols)
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), ExportError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn export_rows_csv<P: AsRef<Path>>(
    path: P,
    columns: &[String],
    rows: &[&Map<String, Value>],
) -> Result<usize, ExportError> {
    let mut df = rows_to_dataframe(columns, rows)?;
    write_csv(path, &mut df)?;
    Ok(df.height())
}

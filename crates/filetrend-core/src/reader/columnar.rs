/// Parquet reading through the row API; compiled with the `parquet` feature.
use super::Table;
use crate::error::{Error, Result};
use ::parquet::file::reader::{FileReader, SerializedFileReader};
use ::parquet::record::Field;
use std::fs::File;
use std::path::Path;

pub fn read_parquet(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let reader = SerializedFileReader::new(file).map_err(|e| Error::unreadable(path, e))?;

    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in reader.get_row_iter(None).map_err(|e| Error::unreadable(path, e))? {
        let row = row.map_err(|e| Error::unreadable(path, e))?;
        rows.push(row.get_column_iter().map(|(_, field)| field_text(field)).collect());
    }
    Ok(Table::from_records(columns, rows))
}

fn field_text(field: &Field) -> String {
    match field {
        Field::Null => String::new(),
        Field::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

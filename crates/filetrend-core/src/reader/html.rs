/// HTML table reading: the first `<table>` in the document, first row as
/// header. A document without tables is an empty result, not an error.
use super::Table;
use crate::error::{Error, Result};
use scraper::{Html, Selector};
use std::fs;
use std::path::Path;

pub fn read_html(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let document = Html::parse_document(&String::from_utf8_lossy(&bytes));

    let table_sel = selector(path, "table")?;
    let row_sel = selector(path, "tr")?;
    let cell_sel = selector(path, "th, td")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(Table::empty());
    };

    let mut rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect()
        })
        .collect();
    if rows.is_empty() {
        return Ok(Table::empty());
    }

    let header = rows.remove(0);
    let width = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
    let columns = (0..width)
        .map(|i| match header.get(i) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Unnamed: {i}"),
        })
        .collect();
    Ok(Table::from_records(columns, rows))
}

fn selector(path: &Path, css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::unreadable(path, format!("{e:?}")))
}

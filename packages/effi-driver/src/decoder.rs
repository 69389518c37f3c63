//! Spreadsheet decoding into schema-less records.
//!
//! The Effi export is an XLSX workbook whose columns vary by store and report
//! period, so rows decode into open maps rather than a fixed struct. The
//! first row is the header; empty cells are omitted from the record (a
//! missing field and an empty cell mean the same thing to the query layer).

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Value};

/// Decodes a downloaded tabular artifact into ordered, schema-less records.
pub trait GuideDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Vec<Map<String, Value>>>;
}

/// XLSX decoder backed by calamine. Reads the first worksheet.
#[derive(Debug, Default)]
pub struct XlsxGuideDecoder;

impl XlsxGuideDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl GuideDecoder for XlsxGuideDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<Map<String, Value>>> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook {}", path.display()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("Workbook {} has no sheets", path.display()))?
            .context("Failed to read first worksheet")?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    let name = cell.to_string().trim().to_string();
                    if name.is_empty() {
                        format!("columna_{}", i + 1)
                    } else {
                        name
                    }
                })
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for row in rows {
            let mut record = Map::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if let Some(value) = cell_to_value(cell) {
                    record.insert(header.clone(), value);
                }
            }
            if !record.is_empty() {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(Value::String(s.to_string()))
            }
        }
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => {
            // Excel stores everything numeric as a float; keep integral
            // values as integers so guide numbers round-trip as written.
            if f.fract() == 0.0 && f.abs() < 9e15 {
                Some(Value::from(*f as i64))
            } else {
                Some(Value::from(*f))
            }
        }
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

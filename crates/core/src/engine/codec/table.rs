//! Table parsing and serialization for tabular conversions.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::format::MediaFormat;

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("{0} is not a tabular format")]
    NotTabular(MediaFormat),

    #[error("Malformed {format} at line {line}: {reason}")]
    Malformed {
        format: MediaFormat,
        line: usize,
        reason: String,
    },
}

/// A rectangular table of text cells with a header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Raw text plus declared format to table, and back. Implementations are pure.
pub trait TableCodec: Send + Sync {
    fn parse(&self, raw: &str, format: MediaFormat) -> Result<Table, TableError>;
    fn serialize(&self, table: &Table, format: MediaFormat) -> Result<String, TableError>;
}

/// CSV (RFC 4180 quoting), TSV and JSON array-of-objects.
pub struct DelimitedTableCodec;

impl TableCodec for DelimitedTableCodec {
    fn parse(&self, raw: &str, format: MediaFormat) -> Result<Table, TableError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        match format {
            MediaFormat::Csv => parse_csv(raw),
            MediaFormat::Tsv => Ok(parse_tsv(raw)),
            MediaFormat::Json => parse_json(raw),
            other => Err(TableError::NotTabular(other)),
        }
    }

    fn serialize(&self, table: &Table, format: MediaFormat) -> Result<String, TableError> {
        match format {
            MediaFormat::Csv => Ok(write_csv(table)),
            MediaFormat::Tsv => Ok(write_tsv(table)),
            MediaFormat::Json => Ok(write_json(table)),
            other => Err(TableError::NotTabular(other)),
        }
    }
}

fn from_records(mut records: Vec<Vec<String>>) -> Table {
    if records.is_empty() {
        return Table::default();
    }
    let headers = records.remove(0);
    Table {
        headers,
        rows: records,
    }
}

fn parse_csv(raw: &str) -> Result<Table, TableError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                line += 1;
            }
            ('\n', true) => {
                field.push(c);
                line += 1;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::Malformed {
            format: MediaFormat::Csv,
            line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(from_records(records))
}

fn parse_tsv(raw: &str) -> Table {
    let records = raw
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.split('\t').map(str::to_string).collect())
        .collect();
    from_records(records)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_json(raw: &str) -> Result<Table, TableError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| TableError::Malformed {
        format: MediaFormat::Json,
        line: e.line(),
        reason: e.to_string(),
    })?;

    let items = match value {
        Value::Array(items) => items,
        _ => {
            return Err(TableError::Malformed {
                format: MediaFormat::Json,
                line: 1,
                reason: "expected an array of objects".to_string(),
            })
        }
    };

    let mut headers: Vec<String> = Vec::new();
    for item in &items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(TableError::Malformed {
                format: MediaFormat::Json,
                line: index + 1,
                reason: "array element is not an object".to_string(),
            });
        };
        rows.push(
            headers
                .iter()
                .map(|h| map.get(h).map(cell_text).unwrap_or_default())
                .collect(),
        );
    }

    Ok(Table { headers, rows })
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_csv(table: &Table) -> String {
    std::iter::once(&table.headers)
        .chain(table.rows.iter())
        .map(|record| {
            let mut line = record.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
            line.push('\n');
            line
        })
        .collect()
}

fn write_tsv(table: &Table) -> String {
    std::iter::once(&table.headers)
        .chain(table.rows.iter())
        .map(|record| {
            let mut line = record
                .iter()
                .map(|f| f.replace(['\t', '\n'], " "))
                .collect::<Vec<_>>()
                .join("\t");
            line.push('\n');
            line
        })
        .collect()
}

fn write_json(table: &Table) -> String {
    let items: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let map: Map<String, Value> = table
                .headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let cell = row.get(i).cloned().unwrap_or_default();
                    (h.clone(), Value::String(cell))
                })
                .collect();
            Value::Object(map)
        })
        .collect();
    Value::Array(items).to_string()
}

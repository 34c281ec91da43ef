//! JSON codec used for JSON-family formats.
//!
//! Row-oriented formats serialize one record per line; document formats are
//! serialized as `{"meta": [...], "data": [...]}` and parsed whole.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::DataFormat;
use crate::error::{LinkError, Result};
use crate::models::ColumnMeta;

/// Serialize one record as a newline-terminated line.
pub fn encode_record<T: Serialize>(format: DataFormat, record: &T) -> Result<String> {
    if !format.is_json_each_row() {
        return Err(LinkError::ValidationError(format!(
            "The client does not support JSON encoding in {} format",
            format
        )));
    }
    let mut line = serde_json::to_string(record)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line of a line-delimited JSON format.
pub fn decode_record<T: DeserializeOwned>(format: DataFormat, line: &str) -> Result<T> {
    if !format.is_json_each_row() {
        return Err(LinkError::DecodeError(format!("Cannot decode {} as JSON", format)));
    }
    serde_json::from_str(line).map_err(|e| {
        LinkError::DecodeError(format!("Malformed {} record ({}): {}", format, e, preview(line)))
    })
}

/// Parse a whole response body according to `format`.
///
/// Line-delimited formats become a JSON array with one element per line;
/// document formats are parsed as a single value.
pub fn parse_whole<T: DeserializeOwned>(format: DataFormat, body: &[u8]) -> Result<T> {
    if format.is_single_document() {
        return serde_json::from_slice(body)
            .map_err(|e| LinkError::DecodeError(format!("Malformed {} document: {}", format, e)));
    }
    if !format.is_json_each_row() {
        return Err(LinkError::DecodeError(format!("Cannot decode {} as JSON", format)));
    }

    let text = std::str::from_utf8(body)
        .map_err(|e| LinkError::DecodeError(format!("Response is not valid UTF-8: {}", e)))?;
    let mut rows = Vec::new();
    for line in text.split('\n').filter(|line| !line.trim().is_empty()) {
        rows.push(decode_record::<JsonValue>(format, line)?);
    }
    serde_json::from_value(JsonValue::Array(rows))
        .map_err(|e| LinkError::DecodeError(format!("Cannot map {} rows: {}", format, e)))
}

/// Header emitted once before envelope rows.
pub fn envelope_header(format: DataFormat, meta: &[ColumnMeta]) -> Result<String> {
    if format.is_single_document() {
        let meta_json = serde_json::to_string(meta)?;
        return Ok(format!("{{\"meta\":{},\"data\":[", meta_json));
    }

    let names: Vec<&str> = meta.iter().map(|column| column.name.as_str()).collect();
    let mut header = serde_json::to_string(&names)?;
    header.push('\n');
    if format.requires_column_types() {
        let types = meta
            .iter()
            .map(|column| {
                column.column_type.as_deref().ok_or_else(|| {
                    LinkError::ValidationError(format!(
                        "{} requires a type for column '{}'",
                        format, column.name
                    ))
                })
            })
            .collect::<Result<Vec<&str>>>()?;
        header.push_str(&serde_json::to_string(&types)?);
        header.push('\n');
    }
    Ok(header)
}

/// One envelope row. Document rows are comma separated, line rows are
/// newline terminated.
pub fn envelope_row<T: Serialize>(format: DataFormat, row: &T, first: bool) -> Result<String> {
    let encoded = serde_json::to_string(row)?;
    if format.is_single_document() {
        Ok(if first { encoded } else { format!(",{}", encoded) })
    } else {
        Ok(encoded + "\n")
    }
}

/// Trailer emitted after the last envelope row.
pub fn envelope_footer(format: DataFormat) -> &'static str {
    if format.is_single_document() {
        "]}"
    } else {
        ""
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 80;
    match line.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

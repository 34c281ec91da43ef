//! Query text rewriting and query-binding formatting.

use serde_json::Value as JsonValue;

use crate::format::DataFormat;
use crate::models::InsertColumns;

const STATEMENT_TERMINATOR: char = ';';

/// Trim the query and drop the run of `;` at its very end.
///
/// Terminators anywhere else (inside literals, between statements) are kept.
pub fn strip_trailing_terminators(query: &str) -> &str {
    query.trim().trim_end_matches(STATEMENT_TERMINATOR)
}

/// Query text sent by `query`: terminators stripped, FORMAT clause appended.
pub fn with_format_clause(query: &str, format: DataFormat) -> String {
    format!("{} \nFORMAT {}", strip_trailing_terminators(query), format)
}

/// `INSERT INTO <table> [columns] FORMAT <format>`
pub fn insert_statement(table: &str, columns: &InsertColumns, format: DataFormat) -> String {
    let table = table.trim();
    match columns {
        InsertColumns::Only(names) if !names.is_empty() => {
            format!("INSERT INTO {} ({}) FORMAT {}", table, names.join(", "), format)
        },
        InsertColumns::Except(names) if !names.is_empty() => format!(
            "INSERT INTO {} (* EXCEPT ({})) FORMAT {}",
            table,
            names.join(", "),
            format
        ),
        _ => format!("INSERT INTO {} FORMAT {}", table, format),
    }
}

/// Render a query-binding value the way the server parses `param_<name>`.
///
/// Top-level strings are sent unquoted with escape sequences for control
/// characters; strings nested in arrays/maps are single-quoted.
pub fn format_query_param(value: &JsonValue) -> String {
    format_param(value, false)
}

fn format_param(value: &JsonValue, nested: bool) -> String {
    match value {
        JsonValue::Null => {
            if nested {
                "NULL".to_string()
            } else {
                "\\N".to_string()
            }
        },
        JsonValue::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
        JsonValue::Number(number) => number.to_string(),
        JsonValue::String(text) => {
            if nested {
                format!("'{}'", escape_quoted(text))
            } else {
                escape_unquoted(text)
            }
        },
        JsonValue::Array(items) => {
            let inner: Vec<String> = items.iter().map(|item| format_param(item, true)).collect();
            format!("[{}]", inner.join(","))
        },
        JsonValue::Object(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(key, item)| format!("'{}':{}", escape_quoted(key), format_param(item, true)))
                .collect();
            format!("{{{}}}", inner.join(","))
        },
    }
}

fn escape_unquoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn escape_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}

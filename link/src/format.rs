//! Catalogue of wire formats understood by the client.
//!
//! The client never inspects the byte grammar of raw formats (CSV, TSV,
//! Parquet...). JSON formats are serialized and parsed through
//! [`codec`] by format name.

pub mod codec;

use crate::error::{LinkError, Result};
use std::fmt;
use std::str::FromStr;

/// Named wire encoding for row or document data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    // Single-document JSON
    Json,
    JsonStrings,
    JsonCompact,
    JsonCompactStrings,
    JsonColumnsWithMetadata,
    JsonObjectEachRow,

    // Line-delimited JSON
    JsonEachRow,
    JsonStringsEachRow,
    JsonCompactEachRow,
    JsonCompactStringsEachRow,
    JsonCompactEachRowWithNames,
    JsonCompactEachRowWithNamesAndTypes,
    JsonCompactStringsEachRowWithNames,
    JsonCompactStringsEachRowWithNamesAndTypes,
    JsonEachRowWithProgress,

    // Raw text
    Csv,
    CsvWithNames,
    CsvWithNamesAndTypes,
    TabSeparated,
    TabSeparatedRaw,
    TabSeparatedWithNames,
    TabSeparatedWithNamesAndTypes,
    CustomSeparated,
    CustomSeparatedWithNames,
    CustomSeparatedWithNamesAndTypes,

    // Raw binary
    Parquet,
}

const ALL_FORMATS: &[DataFormat] = &[
    DataFormat::Json,
    DataFormat::JsonStrings,
    DataFormat::JsonCompact,
    DataFormat::JsonCompactStrings,
    DataFormat::JsonColumnsWithMetadata,
    DataFormat::JsonObjectEachRow,
    DataFormat::JsonEachRow,
    DataFormat::JsonStringsEachRow,
    DataFormat::JsonCompactEachRow,
    DataFormat::JsonCompactStringsEachRow,
    DataFormat::JsonCompactEachRowWithNames,
    DataFormat::JsonCompactEachRowWithNamesAndTypes,
    DataFormat::JsonCompactStringsEachRowWithNames,
    DataFormat::JsonCompactStringsEachRowWithNamesAndTypes,
    DataFormat::JsonEachRowWithProgress,
    DataFormat::Csv,
    DataFormat::CsvWithNames,
    DataFormat::CsvWithNamesAndTypes,
    DataFormat::TabSeparated,
    DataFormat::TabSeparatedRaw,
    DataFormat::TabSeparatedWithNames,
    DataFormat::TabSeparatedWithNamesAndTypes,
    DataFormat::CustomSeparated,
    DataFormat::CustomSeparatedWithNames,
    DataFormat::CustomSeparatedWithNamesAndTypes,
    DataFormat::Parquet,
];

impl DataFormat {
    /// Default format of `query`: one JSON object per row.
    pub const QUERY_DEFAULT: DataFormat = DataFormat::JsonEachRow;

    /// Default format of `insert`: one JSON array per row.
    pub const INSERT_DEFAULT: DataFormat = DataFormat::JsonCompactEachRow;

    /// Server-side name, as used in `FORMAT <name>` clauses.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Json => "JSON",
            DataFormat::JsonStrings => "JSONStrings",
            DataFormat::JsonCompact => "JSONCompact",
            DataFormat::JsonCompactStrings => "JSONCompactStrings",
            DataFormat::JsonColumnsWithMetadata => "JSONColumnsWithMetadata",
            DataFormat::JsonObjectEachRow => "JSONObjectEachRow",
            DataFormat::JsonEachRow => "JSONEachRow",
            DataFormat::JsonStringsEachRow => "JSONStringsEachRow",
            DataFormat::JsonCompactEachRow => "JSONCompactEachRow",
            DataFormat::JsonCompactStringsEachRow => "JSONCompactStringsEachRow",
            DataFormat::JsonCompactEachRowWithNames => "JSONCompactEachRowWithNames",
            DataFormat::JsonCompactEachRowWithNamesAndTypes => {
                "JSONCompactEachRowWithNamesAndTypes"
            },
            DataFormat::JsonCompactStringsEachRowWithNames => "JSONCompactStringsEachRowWithNames",
            DataFormat::JsonCompactStringsEachRowWithNamesAndTypes => {
                "JSONCompactStringsEachRowWithNamesAndTypes"
            },
            DataFormat::JsonEachRowWithProgress => "JSONEachRowWithProgress",
            DataFormat::Csv => "CSV",
            DataFormat::CsvWithNames => "CSVWithNames",
            DataFormat::CsvWithNamesAndTypes => "CSVWithNamesAndTypes",
            DataFormat::TabSeparated => "TabSeparated",
            DataFormat::TabSeparatedRaw => "TabSeparatedRaw",
            DataFormat::TabSeparatedWithNames => "TabSeparatedWithNames",
            DataFormat::TabSeparatedWithNamesAndTypes => "TabSeparatedWithNamesAndTypes",
            DataFormat::CustomSeparated => "CustomSeparated",
            DataFormat::CustomSeparatedWithNames => "CustomSeparatedWithNames",
            DataFormat::CustomSeparatedWithNamesAndTypes => "CustomSeparatedWithNamesAndTypes",
            DataFormat::Parquet => "Parquet",
        }
    }

    /// All known formats.
    pub fn all() -> &'static [DataFormat] {
        ALL_FORMATS
    }

    /// JSON family (documents and line-delimited).
    pub fn is_json(&self) -> bool {
        self.is_single_document() || self.is_json_each_row()
    }

    /// Formats whose body is one JSON document that must be parsed whole.
    pub fn is_single_document(&self) -> bool {
        matches!(
            self,
            DataFormat::Json
                | DataFormat::JsonStrings
                | DataFormat::JsonCompact
                | DataFormat::JsonCompactStrings
                | DataFormat::JsonColumnsWithMetadata
                | DataFormat::JsonObjectEachRow
        )
    }

    /// Line-delimited JSON: every line is an independent JSON value.
    pub fn is_json_each_row(&self) -> bool {
        matches!(
            self,
            DataFormat::JsonEachRow
                | DataFormat::JsonStringsEachRow
                | DataFormat::JsonCompactEachRow
                | DataFormat::JsonCompactStringsEachRow
                | DataFormat::JsonCompactEachRowWithNames
                | DataFormat::JsonCompactEachRowWithNamesAndTypes
                | DataFormat::JsonCompactStringsEachRowWithNames
                | DataFormat::JsonCompactStringsEachRowWithNamesAndTypes
                | DataFormat::JsonEachRowWithProgress
        )
    }

    /// Formats passed through as opaque bytes.
    pub fn is_raw(&self) -> bool {
        !self.is_json()
    }

    /// Results can be split into rows on newline boundaries.
    pub fn is_streamable(&self) -> bool {
        self.is_json_each_row() || (self.is_raw() && *self != DataFormat::Parquet)
    }

    /// Formats that take one serialized record per line with no header.
    pub fn accepts_records(&self) -> bool {
        matches!(
            self,
            DataFormat::JsonEachRow
                | DataFormat::JsonStringsEachRow
                | DataFormat::JsonCompactEachRow
                | DataFormat::JsonCompactStringsEachRow
        )
    }

    /// Formats that take column metadata followed by rows.
    pub fn accepts_envelope(&self) -> bool {
        matches!(
            self,
            DataFormat::Json
                | DataFormat::JsonStrings
                | DataFormat::JsonCompact
                | DataFormat::JsonCompactStrings
                | DataFormat::JsonCompactEachRowWithNames
                | DataFormat::JsonCompactEachRowWithNamesAndTypes
                | DataFormat::JsonCompactStringsEachRowWithNames
                | DataFormat::JsonCompactStringsEachRowWithNamesAndTypes
        )
    }

    /// Envelope formats that carry a line of column types.
    pub fn requires_column_types(&self) -> bool {
        matches!(
            self,
            DataFormat::JsonCompactEachRowWithNamesAndTypes
                | DataFormat::JsonCompactStringsEachRowWithNamesAndTypes
        )
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_FORMATS
            .iter()
            .copied()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LinkError::ValidationError(format!("Unknown format: {}", s)))
    }
}

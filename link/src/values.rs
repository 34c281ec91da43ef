//! Insertable value shapes.
//!
//! [`InsertValues`] is dispatched once by the [`encoder`]; each variant has
//! its own encoding path and validation rules.

pub mod encoder;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::ColumnMeta;

/// Stream of raw bytes, forwarded to the server untouched.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Stream of structured records, serialized one by one.
pub type RecordStream<T> = BoxStream<'static, Result<T>>;

/// Values for one insert call.
pub enum InsertValues<T> {
    /// Finite in-memory rows, serialized eagerly into one payload
    Rows(Vec<T>),

    /// Records serialized lazily as the transport pulls them
    Records(RecordStream<T>),

    /// Bytes already encoded in the target format
    Raw(ByteStream),

    /// Column metadata followed by lazily serialized rows
    Envelope(JsonEnvelope<T>),
}

/// Structured input: column metadata serialized once, then the rows.
pub struct JsonEnvelope<T> {
    pub meta: Vec<ColumnMeta>,
    pub rows: RecordStream<T>,
}

impl<T: Send + 'static> JsonEnvelope<T> {
    pub fn new(meta: Vec<ColumnMeta>, rows: Vec<T>) -> Self {
        Self {
            meta,
            rows: stream::iter(rows.into_iter().map(Ok)).boxed(),
        }
    }

    pub fn from_stream<S>(meta: Vec<ColumnMeta>, rows: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Self {
            meta,
            rows: rows.boxed(),
        }
    }
}

impl<T> InsertValues<T> {
    pub fn rows(rows: Vec<T>) -> Self {
        Self::Rows(rows)
    }

    pub fn records<S>(records: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Self::Records(records.boxed())
    }

    pub fn envelope(envelope: JsonEnvelope<T>) -> Self {
        Self::Envelope(envelope)
    }

    /// Short name of the variant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Records(_) => "record stream",
            Self::Raw(_) => "raw byte stream",
            Self::Envelope(_) => "JSON envelope",
        }
    }

    /// True for an in-memory row set with nothing in it.
    pub fn is_empty_rows(&self) -> bool {
        matches!(self, Self::Rows(rows) if rows.is_empty())
    }
}

impl InsertValues<JsonValue> {
    /// Pre-encoded bytes (CSV, TSV, Parquet...).
    pub fn raw<S>(bytes: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self::Raw(bytes.boxed())
    }

    /// A single pre-encoded chunk.
    pub fn raw_text(text: impl Into<Bytes>) -> Self {
        Self::Raw(stream::iter(vec![Ok(text.into())]).boxed())
    }
}

impl<T> std::fmt::Debug for InsertValues<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows(rows) => f.debug_struct("Rows").field("len", &rows.len()).finish(),
            Self::Envelope(envelope) => {
                f.debug_struct("Envelope").field("meta", &envelope.meta).finish_non_exhaustive()
            },
            other => f.write_str(other.kind()),
        }
    }
}

//! Validation and encoding of insert values into transport payloads.

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use log::debug;
use serde::Serialize;

use super::{ByteStream, InsertValues, JsonEnvelope};
use crate::error::{LinkError, Result};
use crate::format::{codec, DataFormat};

/// Body handed to the connection.
pub enum EncodedPayload {
    /// Fully serialized in memory
    Text(String),

    /// Produced lazily while the request body is sent
    Stream(ByteStream),
}

impl EncodedPayload {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl std::fmt::Debug for EncodedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Turns [`InsertValues`] into a payload for a named format.
pub trait ValuesEncoder<T>: Send + Sync {
    /// Fail fast when the value shape does not fit the format.
    fn validate(&self, values: &InsertValues<T>, format: DataFormat) -> Result<()>;

    /// Encode validated values.
    fn encode(&self, values: InsertValues<T>, format: DataFormat) -> Result<EncodedPayload>;
}

/// Encoder for serde-serializable records, using the JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValuesEncoder;

impl<T> ValuesEncoder<T> for JsonValuesEncoder
where
    T: Serialize + Send + 'static,
{
    fn validate(&self, values: &InsertValues<T>, format: DataFormat) -> Result<()> {
        match values {
            InsertValues::Rows(_) | InsertValues::Records(_) => {
                if !format.accepts_records() {
                    return Err(LinkError::ValidationError(format!(
                        "Insert of {} expects a JSON each-row format, got {}",
                        values.kind(),
                        format
                    )));
                }
            },
            InsertValues::Raw(_) => {
                if !format.is_raw() {
                    return Err(LinkError::ValidationError(format!(
                        "Insert for {} expects a stream of records, not raw bytes",
                        format
                    )));
                }
            },
            InsertValues::Envelope(envelope) => {
                if !format.accepts_envelope() {
                    return Err(LinkError::ValidationError(format!(
                        "Format {} does not accept column metadata",
                        format
                    )));
                }
                if envelope.meta.is_empty() {
                    return Err(LinkError::ValidationError(
                        "JSON envelope requires at least one column".to_string(),
                    ));
                }
                if format.requires_column_types()
                    && envelope.meta.iter().any(|column| column.column_type.is_none())
                {
                    return Err(LinkError::ValidationError(format!(
                        "Format {} requires a type for every column",
                        format
                    )));
                }
            },
        }
        Ok(())
    }

    fn encode(&self, values: InsertValues<T>, format: DataFormat) -> Result<EncodedPayload> {
        self.validate(&values, format)?;

        match values {
            InsertValues::Rows(rows) => {
                let mut payload = String::new();
                for row in &rows {
                    payload.push_str(&codec::encode_record(format, row)?);
                }
                debug!(
                    "[LINK_ENCODE] Encoded {} rows as {} ({} bytes)",
                    rows.len(),
                    format,
                    payload.len()
                );
                Ok(EncodedPayload::Text(payload))
            },
            InsertValues::Records(records) => {
                let encoded = records.map(move |record| {
                    record.and_then(|record| codec::encode_record(format, &record).map(Bytes::from))
                });
                Ok(EncodedPayload::Stream(encoded.boxed()))
            },
            InsertValues::Raw(bytes) => Ok(EncodedPayload::Stream(bytes)),
            InsertValues::Envelope(envelope) => encode_envelope(envelope, format),
        }
    }
}

fn encode_envelope<T>(envelope: JsonEnvelope<T>, format: DataFormat) -> Result<EncodedPayload>
where
    T: Serialize + Send + 'static,
{
    let JsonEnvelope { meta, rows } = envelope;
    let header = codec::envelope_header(format, &meta)?;
    let footer = codec::envelope_footer(format);

    let rows = rows.enumerate().map(move |(idx, row)| {
        row.and_then(|row| codec::envelope_row(format, &row, idx == 0).map(Bytes::from))
    });

    let mut body = stream::iter(vec![Ok(Bytes::from(header))]).chain(rows).boxed();
    if !footer.is_empty() {
        body = body.chain(stream::iter(vec![Ok(Bytes::from_static(footer.as_bytes()))])).boxed();
    }
    Ok(EncodedPayload::Stream(body))
}

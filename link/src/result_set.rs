//! Caller-facing wrapper over a query response stream.
//!
//! A [`ResultSet`] can be read whole ([`text`](ResultSet::text),
//! [`bytes`](ResultSet::bytes), [`json`](ResultSet::json)) or lazily as
//! row batches ([`stream`](ResultSet::stream)). Either way the body is read
//! once: whole reads after consumption return an empty result, and a second
//! `stream()` fails with [`LinkError::StreamConsumed`]. A whole read that
//! failed half way is not reported as empty: later reads fail with
//! `StreamConsumed`.

pub mod rows;

use bytes::{Bytes, BytesMut};
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use log::debug;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::connection::BodyStream;
use crate::error::{LinkError, Result};
use crate::format::{codec, DataFormat};
use crate::models::{ExecResult, QuerySummary};

pub use rows::{Row, RowStream};

/// Response of [`LinkClient::query`](crate::LinkClient::query).
///
/// Dropping the result set (or calling [`close`](ResultSet::close)) releases
/// the underlying transport slot even if the body was not read.
///
/// # Examples
///
/// ```rust,no_run
/// use columnar_link::{LinkClient, QueryParams};
/// use futures_util::StreamExt;
///
/// # async fn example() -> columnar_link::Result<()> {
/// let client = LinkClient::builder().url("http://localhost:8123").build()?;
///
/// let mut result = client.query(QueryParams::new("SELECT number FROM system.numbers LIMIT 3")).await?;
/// let mut batches = result.stream()?;
/// while let Some(batch) = batches.next().await {
///     for row in batch? {
///         println!("{}", row.text()?);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct ResultSet<S = BodyStream> {
    stream: Option<S>,
    format: DataFormat,
    query_id: String,
    summary: Option<QuerySummary>,
    response_headers: HeaderMap,
    /// Set when a whole read hit a transport error
    drain_failed: bool,
}

impl<S> ResultSet<S>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    pub fn new(stream: S, format: DataFormat, query_id: impl Into<String>) -> Self {
        Self {
            stream: Some(stream),
            format,
            query_id: query_id.into(),
            summary: None,
            response_headers: HeaderMap::new(),
            drain_failed: false,
        }
    }

    pub(crate) fn from_exec(exec: ExecResult<S>, format: DataFormat) -> Self {
        Self {
            stream: Some(exec.stream),
            format,
            query_id: exec.query_id,
            summary: exec.summary,
            response_headers: exec.response_headers,
            drain_failed: false,
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    pub fn summary(&self) -> Option<&QuerySummary> {
        self.summary.as_ref()
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// True once the body has been taken by a read or by `close()`.
    pub fn is_consumed(&self) -> bool {
        self.stream.is_none()
    }

    /// Drain the whole body. Returns empty bytes once consumed, or
    /// [`LinkError::StreamConsumed`] if an earlier drain failed.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let Some(mut stream) = self.stream.take() else {
            if self.drain_failed {
                return Err(LinkError::StreamConsumed);
            }
            return Ok(Bytes::new());
        };

        let mut body = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => body.extend_from_slice(&chunk),
                Err(e) => {
                    self.drain_failed = true;
                    return Err(e);
                },
            }
        }
        debug!("[LINK_RESULT] query_id={} drained {} bytes", self.query_id, body.len());
        Ok(body.freeze())
    }

    /// Drain the whole body as text. Returns an empty string once consumed.
    pub async fn text(&mut self) -> Result<String> {
        let body = self.bytes().await?;
        String::from_utf8(body.to_vec())
            .map_err(|e| LinkError::DecodeError(format!("Response is not valid UTF-8: {}", e)))
    }

    /// Drain and parse the body.
    ///
    /// Line-delimited formats are parsed into an array of rows (use
    /// `Vec<MyRow>` as `T`); document formats into the document. Raw
    /// formats cannot be parsed. Once consumed, line-delimited formats yield
    /// an empty array and document formats yield `null`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        if !self.format.is_json() {
            return Err(LinkError::DecodeError(format!("Cannot decode {} as JSON", self.format)));
        }
        if self.drain_failed {
            return Err(LinkError::StreamConsumed);
        }
        if self.is_consumed() {
            let empty = if self.format.is_json_each_row() {
                JsonValue::Array(Vec::new())
            } else {
                JsonValue::Null
            };
            return serde_json::from_value(empty)
                .map_err(|e| LinkError::DecodeError(format!("Result already consumed: {}", e)));
        }

        let body = self.bytes().await?;
        codec::parse_whole(self.format, &body)
    }

    /// Lazily read the body as batches of rows.
    pub fn stream(&mut self) -> Result<RowStream<S>> {
        if !self.format.is_streamable() {
            return Err(LinkError::DecodeError(format!(
                "{} format is not streamable",
                self.format
            )));
        }
        let stream = self.stream.take().ok_or(LinkError::StreamConsumed)?;
        Ok(RowStream::new(stream, self.format))
    }

    /// Lazily read and decode every row as `T`. The stream ends after the
    /// first error (transport or decode).
    pub fn rows<T>(&mut self) -> Result<impl Stream<Item = Result<T>> + Send>
    where
        T: DeserializeOwned + Send + 'static,
        S: 'static,
    {
        let batches = self.stream()?;
        let decoded = batches
            .flat_map(|batch| match batch {
                Ok(rows) => {
                    let decoded: Vec<Result<T>> = rows.iter().map(|row| row.json::<T>()).collect();
                    stream::iter(decoded)
                },
                Err(e) => stream::iter(vec![Err(e)]),
            })
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                *failed = item.is_err();
                future::ready(Some(item))
            });
        Ok(decoded)
    }

    /// Release the body without reading it.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("[LINK_RESULT] query_id={} closed before full read", self.query_id);
        }
    }
}

impl<S> std::fmt::Debug for ResultSet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("query_id", &self.query_id)
            .field("format", &self.format)
            .field("consumed", &self.stream.is_none())
            .field("drain_failed", &self.drain_failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::BoxStream;
    use serde::Deserialize;
    use serde_json::json;

    fn result_set(format: DataFormat, parts: &[&'static str]) -> ResultSet<BoxStream<'static, Result<Bytes>>> {
        let chunks: Vec<Result<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        ResultSet::new(stream::iter(chunks).boxed(), format, "qid-1")
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[tokio::test]
    async fn test_text_is_consumed_once() {
        let mut rs = result_set(DataFormat::Csv, &["1,a\n", "2,b\n"]);
        assert_eq!(rs.text().await.unwrap(), "1,a\n2,b\n");
        assert!(rs.is_consumed());
        assert_eq!(rs.text().await.unwrap(), "");
        assert!(rs.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_drain_is_not_reported_as_empty() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"id\":1}\n")),
            Err(LinkError::NetworkError("connection reset".into())),
        ];
        let mut rs = ResultSet::new(stream::iter(chunks).boxed(), DataFormat::JsonEachRow, "qid-2");

        assert!(matches!(rs.text().await, Err(LinkError::NetworkError(_))));
        assert!(matches!(rs.text().await, Err(LinkError::StreamConsumed)));
        assert!(matches!(rs.bytes().await, Err(LinkError::StreamConsumed)));
        assert!(matches!(rs.json::<JsonValue>().await, Err(LinkError::StreamConsumed)));
    }

    #[tokio::test]
    async fn test_json_each_row() {
        let mut rs = result_set(DataFormat::JsonEachRow, &["{\"id\":1}\n{\"id\"", ":2}\n"]);
        let items: Vec<Item> = rs.json().await.unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);

        let again: Vec<Item> = rs.json().await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_json_document() {
        let mut rs = result_set(DataFormat::Json, &[r#"{"data":[{"id":7}],"rows":1}"#]);
        let doc: JsonValue = rs.json().await.unwrap();
        assert_eq!(doc["data"][0]["id"], json!(7));

        let again: JsonValue = rs.json().await.unwrap();
        assert!(again.is_null());
    }

    #[tokio::test]
    async fn test_json_on_raw_format_fails() {
        let mut rs = result_set(DataFormat::TabSeparated, &["1\t2\n"]);
        assert!(matches!(rs.json::<JsonValue>().await, Err(LinkError::DecodeError(_))));
        // The body was not touched
        assert!(!rs.is_consumed());
    }

    #[tokio::test]
    async fn test_stream_only_once() {
        let mut rs = result_set(DataFormat::JsonEachRow, &["{\"id\":1}\n"]);
        let batches: Vec<_> = rs.stream().unwrap().collect().await;
        assert_eq!(batches.len(), 1);
        assert!(matches!(rs.stream(), Err(LinkError::StreamConsumed)));
    }

    #[tokio::test]
    async fn test_document_format_is_not_streamable() {
        let mut rs = result_set(DataFormat::Json, &["{}"]);
        assert!(matches!(rs.stream(), Err(LinkError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_typed_rows_stop_at_first_decode_error() {
        let mut rs = result_set(DataFormat::JsonEachRow, &["{\"id\":1}\n{\"id\":\"x\"}\n{\"id\":3}\n"]);
        let items: Vec<Result<Item>> = rs.rows::<Item>().unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &Item { id: 1 });
        assert!(matches!(items[1], Err(LinkError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_close_releases_stream() {
        let mut rs = result_set(DataFormat::JsonEachRow, &["{\"id\":1}\n"]);
        rs.close();
        assert!(rs.is_consumed());
        assert_eq!(rs.query_id(), "qid-1");
    }
}

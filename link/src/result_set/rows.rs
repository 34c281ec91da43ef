//! Line framing of streamed results.

use bytes::{Bytes, BytesMut};
use futures_util::{ready, Stream};
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{LinkError, Result};
use crate::format::{codec, DataFormat};

/// One record of a line-delimited result. Decoding is done on demand so a
/// malformed record only fails itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: Bytes,
    format: DataFormat,
}

impl Row {
    pub(crate) fn new(line: Bytes, format: DataFormat) -> Self {
        Self { line, format }
    }

    /// Raw bytes of the record, without the line terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.line
    }

    /// The record as text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.line)
            .map_err(|e| LinkError::DecodeError(format!("Row is not valid UTF-8: {}", e)))
    }

    /// Decode the record (JSON formats only).
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        codec::decode_record(self.format, self.text()?)
    }
}

/// Lazy sequence of row batches over a response body.
///
/// Every transport chunk yields the complete lines it finishes; a partial
/// line is carried over to the next chunk. Errors from the body end the
/// sequence after being yielded.
pub struct RowStream<S> {
    inner: S,
    format: DataFormat,
    buffer: BytesMut,
    done: bool,
}

impl<S> RowStream<S> {
    pub(crate) fn new(inner: S, format: DataFormat) -> Self {
        Self {
            inner,
            format,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    pub fn format(&self) -> DataFormat {
        self.format
    }

    fn drain_complete_lines(&mut self) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            if !line.is_empty() {
                rows.push(Row::new(line.freeze(), self.format));
            }
        }
        rows
    }
}

impl<S> Stream for RowStream<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    type Item = Result<Vec<Row>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.buffer.extend_from_slice(&chunk);
                    let rows = this.drain_complete_lines();
                    if !rows.is_empty() {
                        return Poll::Ready(Some(Ok(rows)));
                    }
                },
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                },
                None => {
                    this.done = true;
                    let tail = this.buffer.split();
                    if tail.iter().all(|b| b.is_ascii_whitespace()) {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(vec![Row::new(tail.freeze(), this.format)])));
                },
            }
        }
    }
}

//! Gzip compression for request bodies.
//!
//! String payloads are compressed in one go. Streaming payloads are
//! compressed chunk by chunk as the transport pulls them, so the whole
//! body is never held in memory.

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::stream::{self, Stream, StreamExt};
use std::io::{Read, Write};

use crate::error::{LinkError, Result};

/// Check if data is gzip compressed (magic bytes check)
#[inline]
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Compress a complete payload.
pub fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a complete gzip payload.
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    if !is_gzip(data) {
        return Err(LinkError::CompressionError("Not gzip compressed".to_string()));
    }
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

struct GzipState<S> {
    inner: S,
    encoder: Option<GzEncoder<Vec<u8>>>,
}

/// Compress a byte stream lazily. Each input chunk produces the compressed
/// bytes available so far; the gzip trailer is emitted when the input ends.
pub fn gzip_stream<S>(input: S) -> impl Stream<Item = Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    let state = GzipState {
        inner: input,
        encoder: Some(GzEncoder::new(Vec::new(), Compression::fast())),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let encoder = state.encoder.as_mut()?;
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = encoder.write_all(&chunk) {
                        state.encoder = None;
                        return Some((Err(e.into()), state));
                    }
                    let produced = std::mem::take(encoder.get_mut());
                    if produced.is_empty() {
                        // Deflate buffered everything; pull more input
                        continue;
                    }
                    return Some((Ok(Bytes::from(produced)), state));
                },
                Some(Err(e)) => {
                    state.encoder = None;
                    return Some((Err(e), state));
                },
                None => {
                    let encoder = state.encoder.take()?;
                    return match encoder.finish() {
                        Ok(tail) => Some((Ok(Bytes::from(tail)), state)),
                        Err(e) => Some((Err(e.into()), state)),
                    };
                },
            }
        }
    })
}

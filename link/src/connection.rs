//! Connection abstraction: raw requests against one endpoint.
//!
//! A [`Connection`] knows nothing about formats or query rewriting. It sends
//! the query text and settings it is given and hands back the undecoded
//! response body plus metadata. [`HttpConnection`] is the binding over
//! `reqwest`; tests substitute their own implementations.

mod body;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{CommandResult, ExecResult, PingResult};
use crate::settings::Settings;
use crate::values::encoder::EncodedPayload;

pub use http::HttpConnection;

/// Response body of the HTTP connection.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// Fields shared by every connection request.
#[derive(Debug, Clone, Default)]
pub struct ConnBaseRequest {
    /// Final query text; no further rewriting happens below this point
    pub query: String,

    /// Connection defaults already overlaid with the call's settings
    pub settings: Settings,

    pub query_params: BTreeMap<String, JsonValue>,

    pub query_id: String,

    /// Falls back to the connection's session when `None`
    pub session_id: Option<String>,

    /// Falls back to the connection's roles when `None`
    pub role: Option<Vec<String>>,

    pub cancel_token: Option<CancellationToken>,
}

pub type ConnQueryRequest = ConnBaseRequest;
pub type ConnExecRequest = ConnBaseRequest;

/// Insert request: `base.query` is the `INSERT ... FORMAT ...` statement,
/// `values` the encoded body.
#[derive(Debug)]
pub struct ConnInsertRequest {
    pub base: ConnBaseRequest,
    pub values: EncodedPayload,
}

pub type ConnStreamResponse<S> = ExecResult<S>;

/// Insert responses carry no body.
pub type ConnInsertResponse = CommandResult;

/// Transport binding used by [`LinkClient`](crate::LinkClient).
#[async_trait]
pub trait Connection: Send + Sync {
    /// Response body type. Must be drained or dropped to free the slot held
    /// by the call.
    type Stream: Stream<Item = Result<Bytes>> + Send + Unpin + 'static;

    /// Run a query whose text already carries its FORMAT clause.
    async fn query(&self, request: ConnQueryRequest) -> Result<ConnStreamResponse<Self::Stream>>;

    /// Run a statement and return its body as-is.
    async fn exec(&self, request: ConnExecRequest) -> Result<ConnStreamResponse<Self::Stream>>;

    /// Send an insert body. The response body is discarded.
    async fn insert(&self, request: ConnInsertRequest) -> Result<ConnInsertResponse>;

    /// Liveness check. Never fails; errors are reported in the result.
    async fn ping(&self) -> PingResult;

    /// Release pooled resources. Later calls fail with
    /// [`LinkError::ConnectionClosed`](crate::LinkError::ConnectionClosed).
    async fn close(&self) -> Result<()>;
}

//! # columnar-link: HTTP client for columnar database servers
//!
//! An async client speaking the ClickHouse HTTP interface: queries with
//! `FORMAT` clauses, commands, streaming inserts and liveness checks.
//!
//! ## Features
//!
//! - **Streaming results**: read a response whole or lazily as row batches
//! - **Streaming inserts**: in-memory rows, record streams, raw bytes or
//!   JSON envelopes, serialized as the transport pulls them
//! - **Compression**: gzip request bodies and gzip responses
//! - **Cancellation & timeouts**: per-call `CancellationToken`, no-progress
//!   timeout on every chunk
//! - **Bounded concurrency**: optional cap on calls in flight
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use columnar_link::{DataFormat, InsertParams, InsertValues, LinkClient, QueryParams};
//! use futures_util::StreamExt;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LinkClient::builder()
//!         .url("http://localhost:8123")
//!         .database("default")
//!         .build()?;
//!
//!     let rows = vec![json!({"id": 1}), json!({"id": 2})];
//!     client
//!         .insert(InsertParams::new("t", InsertValues::rows(rows)).with_format(DataFormat::JsonEachRow))
//!         .await?;
//!
//!     let mut result = client.query(QueryParams::new("SELECT * FROM t ORDER BY id")).await?;
//!     let mut batches = result.stream()?;
//!     while let Some(batch) = batches.next().await {
//!         for row in batch? {
//!             println!("{}", row.text()?);
//!         }
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Authentication
//!
//! ```rust,no_run
//! use columnar_link::LinkClient;
//!
//! # fn example() -> columnar_link::Result<()> {
//! // Username and password
//! let client = LinkClient::builder()
//!     .url("https://db.example.com:8443")
//!     .username("alice")
//!     .password("secret")
//!     .build()?;
//!
//! // Bearer token
//! let client = LinkClient::builder()
//!     .url("https://db.example.com:8443")
//!     .access_token("your-token")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod compression;
pub mod config;
pub mod connection;
pub mod error;
pub mod format;
pub mod log_sink;
pub mod models;
pub mod query;
pub mod result_set;
pub mod settings;
pub mod timeouts;
pub mod values;

// Re-export main types for convenience
pub use auth::AuthProvider;
pub use client::{LinkClient, LinkClientBuilder};
pub use config::{ClientConfig, CompressionSettings, ConnectionParams};
pub use connection::{
    BodyStream, ConnBaseRequest, ConnExecRequest, ConnInsertRequest, ConnInsertResponse,
    ConnQueryRequest, ConnStreamResponse, Connection, HttpConnection,
};
pub use error::{LinkError, Result};
pub use format::DataFormat;
pub use log_sink::{LogRecord, LogSink};
pub use models::{
    BaseParams, ColumnMeta, CommandParams, CommandResult, ExecParams, ExecResult, InsertColumns,
    InsertParams, InsertResult, PingResult, QueryParams, QuerySummary,
};
pub use result_set::{ResultSet, Row, RowStream};
pub use settings::{SettingValue, Settings};
pub use timeouts::{LinkTimeouts, LinkTimeoutsBuilder};
pub use tokio_util::sync::CancellationToken;
pub use values::encoder::{EncodedPayload, JsonValuesEncoder, ValuesEncoder};
pub use values::{ByteStream, InsertValues, JsonEnvelope, RecordStream};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

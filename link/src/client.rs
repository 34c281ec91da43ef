//! Main client with builder pattern.
//!
//! [`LinkClient`] turns per-call parameters into connection requests:
//! it merges settings, assigns query ids, rewrites query text, picks format
//! defaults and drives the values encoder for inserts.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::AuthProvider;
use crate::config::{ClientConfig, ConnectionParams};
use crate::connection::{ConnBaseRequest, ConnInsertRequest, Connection, HttpConnection};
use crate::error::{LinkError, Result};
use crate::format::DataFormat;
use crate::log_sink::LogSink;
use crate::models::{
    BaseParams, CommandParams, CommandResult, ExecParams, ExecResult, InsertParams, InsertResult,
    PingResult, QueryParams,
};
use crate::query::{insert_statement, strip_trailing_terminators, with_format_clause};
use crate::result_set::ResultSet;
use crate::settings::{SettingValue, Settings};
use crate::timeouts::LinkTimeouts;
use crate::values::encoder::{JsonValuesEncoder, ValuesEncoder};

const LOG_MODULE: &str = "Client";

/// Client for one database endpoint.
///
/// Cheap to clone; clones share the connection.
///
/// # Examples
///
/// ```rust,no_run
/// use columnar_link::{InsertParams, InsertValues, LinkClient, QueryParams};
/// use serde_json::json;
///
/// # async fn example() -> columnar_link::Result<()> {
/// let client = LinkClient::builder()
///     .url("http://localhost:8123")
///     .username("default")
///     .request_timeout(std::time::Duration::from_secs(60))
///     .build()?;
///
/// client
///     .insert(InsertParams::new("events", InsertValues::rows(vec![json!([1, "signup"])])))
///     .await?;
///
/// let mut result = client.query(QueryParams::new("SELECT * FROM events")).await?;
/// let rows: Vec<serde_json::Value> = result.json().await?;
/// println!("{:?}", rows);
/// # Ok(())
/// # }
/// ```
pub struct LinkClient<C: Connection = HttpConnection> {
    params: Arc<ConnectionParams>,
    connection: Arc<C>,
}

impl<C: Connection> Clone for LinkClient<C> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            connection: self.connection.clone(),
        }
    }
}

impl LinkClient<HttpConnection> {
    /// Create a new builder for configuring the client
    pub fn builder() -> LinkClientBuilder {
        LinkClientBuilder::new()
    }

    /// Resolve `config` and open an HTTP connection. No request is sent.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let params = Arc::new(ConnectionParams::resolve(config)?);
        let connection = HttpConnection::new(params.clone())?;
        Ok(Self::with_connection(params, connection))
    }
}

impl<C: Connection> LinkClient<C> {
    /// Client over a custom connection binding.
    pub fn with_connection(params: Arc<ConnectionParams>, connection: C) -> Self {
        Self {
            params,
            connection: Arc::new(connection),
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Run a query and wrap its body in a [`ResultSet`].
    ///
    /// Trailing `;` are stripped and `FORMAT <format>` is appended, with
    /// [`DataFormat::QUERY_DEFAULT`] when the call sets none.
    pub async fn query(&self, params: QueryParams) -> Result<ResultSet<C::Stream>> {
        let format = params.format.unwrap_or(DataFormat::QUERY_DEFAULT);
        let query = with_format_clause(&params.query, format);
        let request = self.base_request(query, params.base);

        self.params.log_sink.debug(
            LOG_MODULE,
            format!("[LINK_QUERY] query_id={} format={}", request.query_id, format),
        );
        let response = self.connection.query(request).await?;
        Ok(ResultSet::from_exec(response, format))
    }

    /// Run a statement and return its live response body.
    ///
    /// The text is sent without a FORMAT clause. The caller must drain or
    /// drop `stream`.
    pub async fn exec(&self, params: ExecParams) -> Result<ExecResult<C::Stream>> {
        let query = strip_trailing_terminators(&params.query).to_string();
        let request = self.base_request(query, params.base);

        self.params
            .log_sink
            .debug(LOG_MODULE, format!("[LINK_QUERY] exec query_id={}", request.query_id));
        self.connection.exec(request).await
    }

    /// Run a statement whose output is not needed (DDL, `SET`, `SYSTEM`...).
    /// The response body is dropped as soon as headers arrive.
    pub async fn command(&self, params: CommandParams) -> Result<CommandResult> {
        let ExecResult {
            stream,
            query_id,
            summary,
            response_headers,
        } = self.exec(params).await?;
        drop(stream);

        Ok(CommandResult {
            query_id,
            summary,
            response_headers,
        })
    }

    /// Insert values into a table with the JSON encoder.
    ///
    /// An empty `Rows` set sends nothing and returns `executed = false`.
    pub async fn insert<T>(&self, params: InsertParams<T>) -> Result<InsertResult>
    where
        T: Serialize + Send + 'static,
    {
        self.insert_with(params, &JsonValuesEncoder).await
    }

    /// Insert values with a custom encoder.
    pub async fn insert_with<T, E>(&self, params: InsertParams<T>, encoder: &E) -> Result<InsertResult>
    where
        T: Send + 'static,
        E: ValuesEncoder<T>,
    {
        let format = params.format.unwrap_or(DataFormat::INSERT_DEFAULT);
        if params.table.trim().is_empty() {
            return Err(LinkError::ValidationError("Insert table name is empty".into()));
        }
        encoder.validate(&params.values, format)?;

        if params.values.is_empty_rows() {
            self.params.log_sink.debug(
                LOG_MODULE,
                format!("[LINK_INSERT] table={} no rows, skipping request", params.table.trim()),
            );
            return Ok(InsertResult::skipped());
        }

        let statement = insert_statement(&params.table, &params.columns, format);
        let kind = params.values.kind();
        let values = encoder.encode(params.values, format)?;
        let base = self.base_request(statement, params.base);

        self.params.log_sink.debug(
            LOG_MODULE,
            format!(
                "[LINK_INSERT] table={} query_id={} format={} values={}",
                params.table.trim(),
                base.query_id,
                format,
                kind
            ),
        );
        let response = self.connection.insert(ConnInsertRequest { base, values }).await?;

        Ok(InsertResult {
            executed: true,
            query_id: response.query_id,
            summary: response.summary,
            response_headers: response.response_headers,
        })
    }

    /// Check that the server answers. Never fails; see [`PingResult`].
    pub async fn ping(&self) -> PingResult {
        self.connection.ping().await
    }

    /// Release the connection. Later calls fail with
    /// [`LinkError::ConnectionClosed`].
    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    fn base_request(&self, query: String, base: BaseParams) -> ConnBaseRequest {
        let query_id = base
            .query_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        ConnBaseRequest {
            query,
            settings: self.params.settings.overlay(&base.settings),
            query_params: base.query_params,
            query_id,
            session_id: base.session_id,
            role: base.role,
            cancel_token: base.cancel_token,
        }
    }
}

/// Builder for configuring [`LinkClient`] instances.
#[derive(Debug, Default)]
pub struct LinkClientBuilder {
    config: ClientConfig,
}

impl LinkClientBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration (e.g. [`ClientConfig::from_map`]).
    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Server URL, `http://` or `https://`
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Bearer token authentication (replaces username/password)
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Set authentication provider directly
    pub fn auth(mut self, auth: AuthProvider) -> Self {
        match auth {
            AuthProvider::BasicAuth(username, password) => {
                self.config.username = Some(username);
                self.config.password = Some(password);
                self.config.access_token = None;
            },
            AuthProvider::AccessToken(token) => {
                self.config.username = None;
                self.config.password = None;
                self.config.access_token = Some(token);
            },
        }
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = Some(database.into());
        self
    }

    /// Set every timeout at once
    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.config.connect_timeout = Some(timeouts.connect_timeout);
        self.config.request_timeout = Some(timeouts.request_timeout);
        self.config.pool_idle_timeout = Some(timeouts.pool_idle_timeout);
        self
    }

    /// Maximum time a call may go without progress
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Bound the number of calls in flight at once
    pub fn max_open_connections(mut self, max: usize) -> Self {
        self.config.max_open_connections = Some(max);
        self
    }

    /// Gzip request bodies
    pub fn compress_request(mut self, enabled: bool) -> Self {
        self.config.compression_request = Some(enabled);
        self
    }

    /// Ask the server for gzip responses
    pub fn compress_response(mut self, enabled: bool) -> Self {
        self.config.compression_response = Some(enabled);
        self
    }

    /// Add a setting sent with every call
    pub fn setting(mut self, name: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.config.settings.get_or_insert_with(Settings::new).set(name, value);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.config.settings = Some(settings);
        self
    }

    /// Application name, prepended to the User-Agent
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.config.application = Some(application.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.session_id = Some(session_id.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.config.role.get_or_insert_with(Vec::new).push(role.into());
        self
    }

    /// Extra header sent with every request
    pub fn http_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.http_headers.get_or_insert_with(Default::default).insert(name.into(), value.into());
        self
    }

    pub fn log_sink(mut self, sink: LogSink) -> Self {
        self.config.log_sink = Some(sink);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<LinkClient> {
        LinkClient::new(self.config)
    }
}

//! HTTP binding of [`Connection`] over `reqwest`.
//!
//! Query and exec send the statement as the POST body. Inserts send the
//! statement in the `query` URL parameter and the encoded values as the
//! body. Settings, query bindings and identifiers travel as URL parameters.

use async_trait::async_trait;
use futures_util::stream::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_ENCODING, USER_AGENT};
use reqwest::{Body, Method, RequestBuilder, Response, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::body::{self, guard_stream, Progress, StreamGuard};
use super::{
    BodyStream, ConnBaseRequest, ConnExecRequest, ConnInsertRequest, ConnInsertResponse,
    ConnQueryRequest, ConnStreamResponse, Connection,
};
use crate::compression::{compress_gzip, gzip_stream};
use crate::config::ConnectionParams;
use crate::error::{LinkError, Result};
use crate::models::{PingResult, QuerySummary};
use crate::query::format_query_param;
use crate::values::encoder::EncodedPayload;

const QUERY_ID_HEADER: &str = "x-clickhouse-query-id";
const SUMMARY_HEADER: &str = "x-clickhouse-summary";
const EXCEPTION_CODE_HEADER: &str = "x-clickhouse-exception-code";

const LOG_MODULE: &str = "Connection";

/// `Code: 60. DB::Exception: Table default.t does not exist. (UNKNOWN_TABLE) (version ...)`
static SERVER_ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(?:Code|Error): (\d+).*?Exception: (.+?)\s*\(([A-Z][A-Z0-9_]+)\)").unwrap()
});

/// Connection to one server over HTTP(S).
pub struct HttpConnection {
    params: Arc<ConnectionParams>,
    client: RwLock<Option<reqwest::Client>>,
    closed: AtomicBool,
    /// Bounds in-flight calls; `None` when unbounded
    slots: Option<Arc<Semaphore>>,
    user_agent: String,
}

impl HttpConnection {
    pub fn new(params: Arc<ConnectionParams>) -> Result<Self> {
        let timeouts = &params.timeouts;

        // No client-wide timeout: a long but progressing stream must not be cut
        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeouts.connect_timeout)
            .pool_idle_timeout(timeouts.pool_idle_timeout)
            .gzip(params.compression.response);
        if let Some(max) = params.max_open_connections {
            builder = builder.pool_max_idle_per_host(max);
        }
        let client = builder
            .build()
            .map_err(|e| LinkError::ConfigurationError(e.to_string()))?;

        let user_agent = user_agent(params.application.as_deref());
        params.log_sink.debug(
            LOG_MODULE,
            format!(
                "[LINK_HTTP] Created connection url={} database={} max_open_connections={:?}",
                params.url, params.database, params.max_open_connections
            ),
        );

        Ok(Self {
            slots: params.max_open_connections.map(|max| Arc::new(Semaphore::new(max))),
            client: RwLock::new(Some(client)),
            closed: AtomicBool::new(false),
            user_agent,
            params,
        })
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn client(&self) -> Result<reqwest::Client> {
        if self.is_closed() {
            return Err(LinkError::ConnectionClosed);
        }
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(LinkError::ConnectionClosed)
    }

    /// Endpoint URL with every request-level parameter appended.
    pub(crate) fn request_url(&self, request: &ConnBaseRequest, statement_in_url: bool) -> Url {
        let mut url = self.params.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if statement_in_url {
                pairs.append_pair("query", &request.query);
            }
            pairs.append_pair("database", &self.params.database);
            pairs.append_pair("query_id", &request.query_id);

            if let Some(session_id) =
                request.session_id.as_ref().or(self.params.session_id.as_ref())
            {
                pairs.append_pair("session_id", session_id);
            }
            if let Some(roles) = request.role.as_ref().or(self.params.role.as_ref()) {
                for role in roles {
                    pairs.append_pair("role", role);
                }
            }
            for (name, value) in &request.query_params {
                pairs.append_pair(&format!("param_{}", name), &format_query_param(value));
            }
            for (name, value) in request.settings.iter() {
                pairs.append_pair(name, &value.to_string());
            }
            if self.params.compression.response
                && !request.settings.contains("enable_http_compression")
            {
                pairs.append_pair("enable_http_compression", "1");
            }
        }
        url
    }

    pub(crate) fn ping_url(&self) -> Url {
        let mut url = self.params.url.clone();
        let path = format!("{}/ping", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(None);
        url
    }

    fn request(&self, client: &reqwest::Client, method: Method, url: Url) -> RequestBuilder {
        let builder = client
            .request(method, url)
            .headers(self.params.http_headers.clone())
            .header(USER_AGENT, &self.user_agent);
        self.params.auth.apply_to_request(builder)
    }

    async fn acquire_slot(&self, request: &ConnBaseRequest) -> Result<Option<OwnedSemaphorePermit>> {
        let Some(slots) = &self.slots else {
            return Ok(None);
        };
        let progress = Progress::start();
        let permit = body::wait_for(
            async { slots.clone().acquire_owned().await.map_err(|_| LinkError::ConnectionClosed) },
            request.cancel_token.as_ref(),
            &progress,
            self.params.timeouts.request_timeout,
            &request.query_id,
        )
        .await?;
        Ok(Some(permit))
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        request: &ConnBaseRequest,
        progress: &Progress,
    ) -> Result<Response> {
        let response = body::wait_for(
            async { builder.send().await.map_err(LinkError::from) },
            request.cancel_token.as_ref(),
            progress,
            self.params.timeouts.request_timeout,
            &request.query_id,
        )
        .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let exception_code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let progress = Progress::start();
        let text = body::wait_for(
            async { response.text().await.map_err(LinkError::from) },
            request.cancel_token.as_ref(),
            &progress,
            self.params.timeouts.request_timeout,
            &request.query_id,
        )
        .await
        .unwrap_or_default();

        let error = parse_server_error(status, exception_code, &text);
        let message = format!("[LINK_HTTP] query_id={} failed: {}", request.query_id, error);
        if status >= 500 {
            self.params.log_sink.error(LOG_MODULE, message);
        } else {
            self.params.log_sink.warn(LOG_MODULE, message);
        }
        Err(error)
    }

    fn guard_response(
        &self,
        response: Response,
        request: &ConnBaseRequest,
        query_id: &str,
        permit: Option<OwnedSemaphorePermit>,
    ) -> BodyStream {
        let inner = response.bytes_stream().map(|chunk| chunk.map_err(LinkError::from)).boxed();
        guard_stream(
            inner,
            StreamGuard {
                cancel: request.cancel_token.clone(),
                timeout: self.params.timeouts.request_timeout,
                query_id: query_id.to_string(),
                progress: None,
                permit,
            },
        )
        .boxed()
    }

    async fn stream_request(
        &self,
        request: ConnBaseRequest,
        kind: &'static str,
    ) -> Result<ConnStreamResponse<BodyStream>> {
        let client = self.client()?;
        let permit = self.acquire_slot(&request).await?;

        let url = self.request_url(&request, false);
        let builder = self.request(&client, Method::POST, url).body(request.query.clone());

        let start = Instant::now();
        self.params.log_sink.debug(
            LOG_MODULE,
            format!("[LINK_HTTP] {} query_id={} sending", kind, request.query_id),
        );
        let progress = Progress::start();
        let response = self.send(builder, &request, &progress).await?;
        let (query_id, summary, response_headers) = response_meta(&response, &request.query_id);
        self.params.log_sink.debug(
            LOG_MODULE,
            format!(
                "[LINK_HTTP] {} query_id={} headers received in {:?}",
                kind,
                query_id,
                start.elapsed()
            ),
        );

        let stream = self.guard_response(response, &request, &query_id, permit);
        Ok(ConnStreamResponse {
            stream,
            query_id,
            summary,
            response_headers,
        })
    }
}

#[async_trait]
impl Connection for HttpConnection {
    type Stream = BodyStream;

    async fn query(&self, request: ConnQueryRequest) -> Result<ConnStreamResponse<BodyStream>> {
        self.stream_request(request, "query").await
    }

    async fn exec(&self, request: ConnExecRequest) -> Result<ConnStreamResponse<BodyStream>> {
        self.stream_request(request, "exec").await
    }

    async fn insert(&self, request: ConnInsertRequest) -> Result<ConnInsertResponse> {
        let ConnInsertRequest { base, values } = request;
        let client = self.client()?;
        let permit = self.acquire_slot(&base).await?;

        let url = self.request_url(&base, true);
        let gzip = self.params.compression.request;
        let progress = Progress::start();
        let streamed = values.is_stream();

        let payload = match values {
            EncodedPayload::Text(text) if gzip => Body::from(compress_gzip(text.as_bytes())?),
            EncodedPayload::Text(text) => Body::from(text),
            EncodedPayload::Stream(stream) => {
                let stream = if gzip { gzip_stream(stream).boxed() } else { stream };
                // Upload chunks count as progress for the header wait
                Body::wrap_stream(guard_stream(
                    stream,
                    StreamGuard {
                        cancel: base.cancel_token.clone(),
                        timeout: self.params.timeouts.request_timeout,
                        query_id: base.query_id.clone(),
                        progress: Some(progress.clone()),
                        permit: None,
                    },
                ))
            },
        };

        let mut builder = self.request(&client, Method::POST, url).body(payload);
        if gzip {
            builder = builder.header(CONTENT_ENCODING, "gzip");
        }

        let start = Instant::now();
        self.params.log_sink.debug(
            LOG_MODULE,
            format!(
                "[LINK_HTTP] insert query_id={} streamed={} gzip={}",
                base.query_id, streamed, gzip
            ),
        );
        let response = self.send(builder, &base, &progress).await?;
        let (query_id, summary, response_headers) = response_meta(&response, &base.query_id);

        let mut body = self.guard_response(response, &base, &query_id, permit);
        while let Some(chunk) = body.next().await {
            chunk?;
        }
        self.params.log_sink.debug(
            LOG_MODULE,
            format!("[LINK_HTTP] insert query_id={} done in {:?}", query_id, start.elapsed()),
        );

        Ok(ConnInsertResponse {
            query_id,
            summary,
            response_headers,
        })
    }

    async fn ping(&self) -> PingResult {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return PingResult::failed(e),
        };
        let builder = self.request(&client, Method::GET, self.ping_url());
        let timeout = self.params.timeouts.request_timeout;

        let result = async {
            let progress = Progress::start();
            let response = body::wait_for(
                async { builder.send().await.map_err(LinkError::from) },
                None,
                &progress,
                timeout,
                "ping",
            )
            .await?;

            // Read the body too, so the socket goes back to the pool
            let status = response.status();
            let progress = Progress::start();
            let text = body::wait_for(
                async { response.text().await.map_err(LinkError::from) },
                None,
                &progress,
                timeout,
                "ping",
            )
            .await?;

            if status.is_success() {
                Ok(())
            } else {
                Err(parse_server_error(status.as_u16(), None, &text))
            }
        }
        .await;

        match result {
            Ok(()) => PingResult::ok(),
            Err(e) => {
                self.params
                    .log_sink
                    .warn(LOG_MODULE, format!("[LINK_HTTP] ping failed: {}", e));
                PingResult::failed(e)
            },
        }
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(slots) = &self.slots {
            slots.close();
        }
        self.params
            .log_sink
            .debug(LOG_MODULE, format!("[LINK_HTTP] Closed connection to {}", self.params.url));
        Ok(())
    }
}

/// `<application> columnar-link/<version> (os:<os>)`
pub(crate) fn user_agent(application: Option<&str>) -> String {
    let base = format!("columnar-link/{} (os:{})", crate::VERSION, std::env::consts::OS);
    match application {
        Some(app) => format!("{} {}", app, base),
        None => base,
    }
}

fn response_meta(
    response: &Response,
    sent_query_id: &str,
) -> (String, Option<QuerySummary>, HeaderMap) {
    let headers = response.headers().clone();
    let query_id = headers
        .get(QUERY_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| sent_query_id.to_string());
    let summary = headers
        .get(SUMMARY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(QuerySummary::from_header);
    (query_id, summary, headers)
}

/// Build a [`LinkError::ServerError`] from a non-success response.
pub(crate) fn parse_server_error(
    status_code: u16,
    exception_code: Option<String>,
    body: &str,
) -> LinkError {
    let body = body.trim();
    match SERVER_ERROR_RE.captures(body) {
        Some(caps) => LinkError::ServerError {
            status_code,
            code: caps.get(1).map(|m| m.as_str().to_string()).or(exception_code),
            error_type: caps.get(3).map(|m| m.as_str().to_string()),
            message: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        },
        None => LinkError::ServerError {
            status_code,
            code: exception_code,
            error_type: None,
            message: if body.is_empty() {
                format!("HTTP {}", status_code)
            } else {
                body.to_string()
            },
        },
    }
}

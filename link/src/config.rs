//! Client configuration and its resolution into connection parameters.
//!
//! [`ClientConfig`] is the input boundary: every field is optional.
//! [`ConnectionParams::resolve`] applies the defaults, validates the result
//! once, and produces the immutable parameters a connection is built from.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::auth::{AuthProvider, DEFAULT_USERNAME};
use crate::error::{LinkError, Result};
use crate::log_sink::LogSink;
use crate::settings::Settings;
use crate::timeouts::LinkTimeouts;

/// Endpoint used when no URL is configured.
pub const DEFAULT_URL: &str = "http://localhost:8123";

/// Database used when none is configured.
pub const DEFAULT_DATABASE: &str = "default";

/// User-supplied configuration. Omitted fields take the defaults listed on
/// [`ConnectionParams::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bearer token, replaces username/password
    pub access_token: Option<String>,
    pub database: Option<String>,
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub pool_idle_timeout: Option<Duration>,
    /// Upper bound of concurrent in-flight calls
    pub max_open_connections: Option<usize>,
    /// Gzip request bodies
    pub compression_request: Option<bool>,
    /// Ask the server for gzip responses
    pub compression_response: Option<bool>,
    /// Settings sent with every call
    pub settings: Option<Settings>,
    /// Prepended to the User-Agent header
    pub application: Option<String>,
    pub session_id: Option<String>,
    pub role: Option<Vec<String>>,
    /// Extra headers sent with every request
    pub http_headers: Option<BTreeMap<String, String>>,
    pub log_sink: Option<LogSink>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat string map, e.g. loaded from environment or a config file.
    ///
    /// Durations are milliseconds. `settings.<name>` keys become settings and
    /// `http_headers.<name>` keys become extra headers.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::new();

        config.url = get_str(map, "url", "host");
        config.username = get_str(map, "username", "user");
        config.password = get_str(map, "password", "password");
        config.access_token = get_str(map, "access_token", "access.token");
        config.database = get_str(map, "database", "db");
        config.application = get_str(map, "application", "application.id");
        config.session_id = get_str(map, "session_id", "session.id");

        if let Some(value) = get_str(map, "request_timeout", "request.timeout.ms") {
            config.request_timeout = Some(parse_duration_ms(&value, "request_timeout")?);
        }
        if let Some(value) = get_str(map, "connect_timeout", "connect.timeout.ms") {
            config.connect_timeout = Some(parse_duration_ms(&value, "connect_timeout")?);
        }
        if let Some(value) = get_str(map, "pool_idle_timeout", "keep_alive.idle_socket_ttl") {
            config.pool_idle_timeout = Some(parse_duration_ms(&value, "pool_idle_timeout")?);
        }
        if let Some(value) = get_str(map, "max_open_connections", "max.open.connections") {
            config.max_open_connections = Some(parse_usize(&value, "max_open_connections")?);
        }
        if let Some(value) = get_str(map, "compression.request", "compression_request") {
            config.compression_request = Some(parse_bool(&value)?);
        }
        if let Some(value) = get_str(map, "compression.response", "compression_response") {
            config.compression_response = Some(parse_bool(&value)?);
        }
        if let Some(value) = get_str(map, "role", "roles") {
            let roles: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect();
            if !roles.is_empty() {
                config.role = Some(roles);
            }
        }

        let settings: Settings = map
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("settings.").map(|name| (name.to_string(), value.clone()))
            })
            .collect();
        if !settings.is_empty() {
            config.settings = Some(settings);
        }

        let headers: BTreeMap<String, String> = map
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("http_headers.").map(|name| (name.to_string(), value.clone()))
            })
            .collect();
        if !headers.is_empty() {
            config.http_headers = Some(headers);
        }

        Ok(config)
    }
}

/// Request/response compression flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub request: bool,
    pub response: bool,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            request: false,
            response: true,
        }
    }
}

/// Fully resolved, validated configuration of one connection.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Endpoint without credentials
    pub url: Url,
    pub auth: AuthProvider,
    pub database: String,
    pub timeouts: LinkTimeouts,
    /// `None` means unbounded
    pub max_open_connections: Option<usize>,
    pub compression: CompressionSettings,
    pub settings: Settings,
    pub application: Option<String>,
    pub session_id: Option<String>,
    pub role: Option<Vec<String>>,
    pub http_headers: HeaderMap,
    pub log_sink: LogSink,
}

impl ConnectionParams {
    /// Apply defaults and validate.
    ///
    /// | field | default |
    /// |---|---|
    /// | url | `http://localhost:8123` |
    /// | request_timeout | 30 s |
    /// | connect_timeout | 10 s |
    /// | pool_idle_timeout | 90 s |
    /// | max_open_connections | unbounded |
    /// | compression | response on, request off |
    /// | username / password | `default` / empty |
    /// | database | `default` |
    /// | log sink | `log` facade |
    pub fn resolve(config: ClientConfig) -> Result<Self> {
        let mut url = parse_url(config.url.as_deref().unwrap_or(DEFAULT_URL))?;
        let auth = resolve_auth(&config, &url)?;
        // Never keep credentials in the stored URL
        url.set_username("")
            .and_then(|_| url.set_password(None))
            .map_err(|_| LinkError::ConfigurationError("Cannot strip credentials from URL".into()))?;

        let defaults = LinkTimeouts::default();
        let timeouts = LinkTimeouts {
            connect_timeout: config.connect_timeout.unwrap_or(defaults.connect_timeout),
            request_timeout: config.request_timeout.unwrap_or(defaults.request_timeout),
            pool_idle_timeout: config.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
        };
        if timeouts.request_timeout.is_zero() {
            return Err(LinkError::ConfigurationError(
                "request_timeout must be greater than zero".into(),
            ));
        }
        if timeouts.connect_timeout.is_zero() {
            return Err(LinkError::ConfigurationError(
                "connect_timeout must be greater than zero".into(),
            ));
        }
        if config.max_open_connections == Some(0) {
            return Err(LinkError::ConfigurationError(
                "max_open_connections must be greater than zero".into(),
            ));
        }

        let compression_defaults = CompressionSettings::default();
        let compression = CompressionSettings {
            request: config.compression_request.unwrap_or(compression_defaults.request),
            response: config.compression_response.unwrap_or(compression_defaults.response),
        };

        let database = match config.database {
            Some(db) if !db.trim().is_empty() => db.trim().to_string(),
            Some(_) => {
                return Err(LinkError::ConfigurationError("database must not be empty".into()))
            },
            None => DEFAULT_DATABASE.to_string(),
        };

        Ok(Self {
            url,
            auth,
            database,
            timeouts,
            max_open_connections: config.max_open_connections,
            compression,
            settings: config.settings.unwrap_or_default(),
            application: config.application.filter(|a| !a.trim().is_empty()),
            session_id: config.session_id,
            role: config.role.filter(|roles| !roles.is_empty()),
            http_headers: parse_headers(config.http_headers.unwrap_or_default())?,
            log_sink: config.log_sink.unwrap_or_default(),
        })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| LinkError::ConfigurationError(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {},
        other => {
            return Err(LinkError::ConfigurationError(format!(
                "Unsupported URL scheme '{}', expected http or https",
                other
            )))
        },
    }
    if url.host_str().is_none() {
        return Err(LinkError::ConfigurationError(format!("URL '{}' has no host", raw)));
    }
    Ok(url)
}

fn resolve_auth(config: &ClientConfig, url: &Url) -> Result<AuthProvider> {
    let has_basic = config.username.is_some() || config.password.is_some();
    if let Some(token) = &config.access_token {
        if has_basic {
            return Err(LinkError::ConfigurationError(
                "access_token cannot be combined with username/password".into(),
            ));
        }
        return Ok(AuthProvider::access_token(token.clone()));
    }

    if has_basic {
        return Ok(AuthProvider::basic_auth(
            config.username.clone().unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            config.password.clone().unwrap_or_default(),
        ));
    }

    let url_user = url.username();
    if !url_user.is_empty() {
        return Ok(AuthProvider::basic_auth(
            url_user.to_string(),
            url.password().unwrap_or_default().to_string(),
        ));
    }

    Ok(AuthProvider::default())
}

fn parse_headers(headers: BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            LinkError::ConfigurationError(format!("Invalid HTTP header name: {}", name))
        })?;
        let header_value = HeaderValue::from_str(&value).map_err(|_| {
            LinkError::ConfigurationError(format!("Invalid value for HTTP header {}", name))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn get_str(map: &HashMap<String, String>, key: &str, alias: &str) -> Option<String> {
    map.get(key).cloned().or_else(|| map.get(alias).cloned())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(LinkError::ConfigurationError(format!("Invalid boolean value: {}", value))),
    }
}

fn parse_usize(value: &str, field: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|_| {
        LinkError::ConfigurationError(format!("Invalid {} value: {}", field, value))
    })
}

fn parse_duration_ms(value: &str, field: &str) -> Result<Duration> {
    let millis = value.trim().parse::<u64>().map_err(|_| {
        LinkError::ConfigurationError(format!("Invalid {} (ms) value: {}", field, value))
    })?;
    Ok(Duration::from_millis(millis))
}

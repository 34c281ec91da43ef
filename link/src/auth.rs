//! Authentication provider for the HTTP connection.
//!
//! Handles HTTP Basic Auth and bearer access tokens, attaching the
//! appropriate `Authorization` header to every request.

use base64::{engine::general_purpose, Engine as _};

/// Username used when none is configured.
pub const DEFAULT_USERNAME: &str = "default";

/// Credentials sent with every request.
///
/// # Examples
///
/// ```rust
/// use columnar_link::AuthProvider;
///
/// // HTTP Basic Auth
/// let auth = AuthProvider::basic_auth("alice".to_string(), "secret".to_string());
///
/// // Bearer access token (replaces username/password)
/// let auth = AuthProvider::access_token("eyJhbGc...".to_string());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum AuthProvider {
    /// HTTP Basic Auth (username, password)
    BasicAuth(String, String),

    /// Bearer access token
    AccessToken(String),
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::BasicAuth(DEFAULT_USERNAME.to_string(), String::new())
    }
}

impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BasicAuth(username, _) => {
                f.debug_tuple("BasicAuth").field(username).field(&"***").finish()
            },
            Self::AccessToken(_) => f.debug_tuple("AccessToken").field(&"***").finish(),
        }
    }
}

impl AuthProvider {
    /// Create HTTP Basic Auth credentials.
    pub fn basic_auth(username: String, password: String) -> Self {
        Self::BasicAuth(username, password)
    }

    /// Create bearer token authentication.
    pub fn access_token(token: String) -> Self {
        Self::AccessToken(token)
    }

    /// Username for basic auth, `None` for token auth.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::BasicAuth(username, _) => Some(username),
            Self::AccessToken(_) => None,
        }
    }

    /// Value of the `Authorization` header for these credentials.
    pub fn header_value(&self) -> String {
        match self {
            Self::BasicAuth(username, password) => {
                // RFC 7617
                let credentials = format!("{}:{}", username, password);
                format!("Basic {}", general_purpose::STANDARD.encode(credentials.as_bytes()))
            },
            Self::AccessToken(token) => format!("Bearer {}", token),
        }
    }

    /// Attach the `Authorization` header to an HTTP request builder.
    pub fn apply_to_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(reqwest::header::AUTHORIZATION, self.header_value())
    }
}

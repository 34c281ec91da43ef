use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::settings::Settings;

/// Options shared by every call: settings overlay, query bindings,
/// identifiers and cancellation.
#[derive(Debug, Clone, Default)]
pub struct BaseParams {
    /// Settings merged over the connection defaults (call wins per key)
    pub settings: Settings,

    /// Values for `{name: Type}` placeholders, sent as `param_<name>`
    pub query_params: BTreeMap<String, JsonValue>,

    /// Explicit query id; a UUID v4 is generated when absent
    pub query_id: Option<String>,

    /// Session id overriding the connection's default session
    pub session_id: Option<String>,

    /// Roles overriding the connection's default roles
    pub role: Option<Vec<String>>,

    /// Aborts the request and any stream it returned
    pub cancel_token: Option<CancellationToken>,
}

/// Adds the shared `with_*` builder methods to a parameter type that has a
/// `base: BaseParams` field.
macro_rules! impl_base_params {
    ($ty:ident $(<$generic:ident>)?) => {
        impl$(<$generic>)? $ty$(<$generic>)? {
            /// Set one setting for this call.
            pub fn with_setting(
                mut self,
                name: impl Into<String>,
                value: impl Into<$crate::settings::SettingValue>,
            ) -> Self {
                self.base.settings.set(name, value);
                self
            }

            /// Overlay several settings for this call.
            pub fn with_settings(mut self, settings: $crate::settings::Settings) -> Self {
                self.base.settings = self.base.settings.overlay(&settings);
                self
            }

            /// Bind a value to a `{name: Type}` placeholder.
            pub fn with_query_param(
                mut self,
                name: impl Into<String>,
                value: impl Into<serde_json::Value>,
            ) -> Self {
                self.base.query_params.insert(name.into(), value.into());
                self
            }

            pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
                self.base.query_id = Some(query_id.into());
                self
            }

            pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
                self.base.session_id = Some(session_id.into());
                self
            }

            /// Add a role for this call (replaces the connection's roles).
            pub fn with_role(mut self, role: impl Into<String>) -> Self {
                self.base.role.get_or_insert_with(Vec::new).push(role.into());
                self
            }

            /// Attach a cancellation token. Cancelling it aborts the request
            /// and fails any in-progress stream read.
            pub fn with_cancel_token(
                mut self,
                token: tokio_util::sync::CancellationToken,
            ) -> Self {
                self.base.cancel_token = Some(token);
                self
            }

            pub fn base(&self) -> &$crate::models::BaseParams {
                &self.base
            }
        }
    };
}

pub(crate) use impl_base_params;

use super::base_params::{impl_base_params, BaseParams};

/// Parameters of [`LinkClient::exec`](crate::LinkClient::exec) and
/// [`LinkClient::command`](crate::LinkClient::command).
///
/// The query text is sent as-is (after stripping trailing `;`), so any
/// FORMAT clause is up to the caller.
#[derive(Debug, Clone)]
pub struct ExecParams {
    pub query: String,
    pub base: BaseParams,
}

/// Commands take the same parameters as `exec`.
pub type CommandParams = ExecParams;

impl ExecParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            base: BaseParams::default(),
        }
    }
}

impl_base_params!(ExecParams);

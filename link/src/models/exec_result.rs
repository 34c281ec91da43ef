use reqwest::header::HeaderMap;

use super::query_summary::QuerySummary;

/// Live response of a query or exec call.
///
/// The caller owns `stream` and must drain or drop it to release the
/// transport slot held by the call.
pub struct ExecResult<S> {
    /// Undecoded response body
    pub stream: S,

    /// Query id sent with the request (or assigned by the server)
    pub query_id: String,

    /// Summary header, when the server sent one
    pub summary: Option<QuerySummary>,

    pub response_headers: HeaderMap,
}

impl<S> std::fmt::Debug for ExecResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecResult")
            .field("query_id", &self.query_id)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

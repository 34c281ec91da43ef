use reqwest::header::HeaderMap;

use super::query_summary::QuerySummary;

/// Result of an insert.
#[derive(Debug, Clone)]
pub struct InsertResult {
    /// `false` when the insert was skipped because there were no rows to send
    pub executed: bool,

    /// Query id of the insert; empty when `executed` is `false`
    pub query_id: String,

    /// Written rows/bytes as reported by the server
    pub summary: Option<QuerySummary>,

    pub response_headers: HeaderMap,
}

impl InsertResult {
    /// Result for an insert that sent nothing.
    pub fn skipped() -> Self {
        Self {
            executed: false,
            query_id: String::new(),
            summary: None,
            response_headers: HeaderMap::new(),
        }
    }
}

use reqwest::header::HeaderMap;

use super::query_summary::QuerySummary;

/// Result of a command: the response body has been discarded.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub query_id: String,
    pub summary: Option<QuerySummary>,
    pub response_headers: HeaderMap,
}

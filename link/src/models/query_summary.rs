use serde::{Deserialize, Deserializer, Serialize};

/// Execution summary reported by the server in the `X-ClickHouse-Summary`
/// response header.
///
/// The server encodes every counter as a string (`{"read_rows":"10",...}`);
/// plain numbers are accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySummary {
    #[serde(default, deserialize_with = "de_counter")]
    pub read_rows: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub read_bytes: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub written_rows: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub written_bytes: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub total_rows_to_read: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub result_rows: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub result_bytes: u64,
    #[serde(default, deserialize_with = "de_counter")]
    pub elapsed_ns: u64,
}

impl QuerySummary {
    /// Parse the raw header value. Malformed headers yield `None`.
    pub fn from_header(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Counter {
    Number(u64),
    Text(String),
}

fn de_counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Counter::deserialize(deserializer)? {
        Counter::Number(value) => Ok(value),
        Counter::Text(text) => text.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}

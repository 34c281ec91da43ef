use super::base_params::{impl_base_params, BaseParams};
use crate::format::DataFormat;

/// Parameters of [`LinkClient::query`](crate::LinkClient::query).
///
/// # Examples
///
/// ```rust
/// use columnar_link::{DataFormat, QueryParams};
///
/// let params = QueryParams::new("SELECT * FROM events WHERE id = {id: UInt64}")
///     .with_format(DataFormat::JsonCompactEachRow)
///     .with_query_param("id", 42)
///     .with_setting("max_threads", 4u64);
/// ```
#[derive(Debug, Clone)]
pub struct QueryParams {
    /// Query text without a FORMAT clause; the client appends one
    pub query: String,

    /// Result format, defaults to [`DataFormat::QUERY_DEFAULT`]
    pub format: Option<DataFormat>,

    pub base: BaseParams,
}

impl QueryParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            format: None,
            base: BaseParams::default(),
        }
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }
}

impl_base_params!(QueryParams);

use super::base_params::{impl_base_params, BaseParams};
use crate::format::DataFormat;
use crate::values::InsertValues;

/// Column list of the generated `INSERT` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InsertColumns {
    /// `INSERT INTO t FORMAT ...`
    #[default]
    All,
    /// `INSERT INTO t (a, b) FORMAT ...`
    Only(Vec<String>),
    /// `INSERT INTO t (* EXCEPT (a, b)) FORMAT ...`
    Except(Vec<String>),
}

/// Parameters of [`LinkClient::insert`](crate::LinkClient::insert).
///
/// # Examples
///
/// ```rust
/// use columnar_link::{InsertParams, InsertValues};
/// use serde_json::json;
///
/// let params = InsertParams::new("events", InsertValues::rows(vec![json!([1, "a"])]))
///     .with_setting("async_insert", true);
/// ```
pub struct InsertParams<T> {
    /// Target table, optionally qualified with the database
    pub table: String,

    pub values: InsertValues<T>,

    /// Input format, defaults to [`DataFormat::INSERT_DEFAULT`]
    pub format: Option<DataFormat>,

    pub columns: InsertColumns,

    pub base: BaseParams,
}

impl<T> InsertParams<T> {
    pub fn new(table: impl Into<String>, values: InsertValues<T>) -> Self {
        Self {
            table: table.into(),
            values,
            format: None,
            columns: InsertColumns::All,
            base: BaseParams::default(),
        }
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_columns(mut self, columns: InsertColumns) -> Self {
        self.columns = columns;
        self
    }
}

impl_base_params!(InsertParams<T>);

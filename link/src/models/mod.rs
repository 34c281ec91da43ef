//! Data models for columnar-link.
//!
//! Per-call parameter descriptors and the terminal value objects returned
//! by the client.

pub mod base_params;
pub mod column_meta;
pub mod command_result;
pub mod exec_params;
pub mod exec_result;
pub mod insert_params;
pub mod insert_result;
pub mod ping_result;
pub mod query_params;
pub mod query_summary;


pub use base_params::BaseParams;
pub use column_meta::ColumnMeta;
pub use command_result::CommandResult;
pub use exec_params::{CommandParams, ExecParams};
pub use exec_result::ExecResult;
pub use insert_params::{InsertColumns, InsertParams};
pub use insert_result::InsertResult;
pub use ping_result::PingResult;
pub use query_params::QueryParams;
pub use query_summary::QuerySummary;

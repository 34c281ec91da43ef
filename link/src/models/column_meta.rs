use serde::{Deserialize, Serialize};

/// Column metadata carried by structured (envelope) inserts.
///
/// # Example (JSON representation)
///
/// ```json
/// { "name": "id", "type": "UInt64" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,

    /// Server type name (e.g. `UInt64`, `Nullable(String)`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
}

impl ColumnMeta {
    /// Column with a name only.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: None,
        }
    }

    /// Column with a name and a server type.
    pub fn typed(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: Some(column_type.into()),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum_macros::{Display, EnumString};

pub type TableId = i64;
pub type ColumnId = i64;
pub type RowId = i64;
pub type CellId = i64;
pub type RowNumber = i64;
pub type ExternalId = u64;

/// What the key of a row stands for. Opaque to the engine itself.
#[derive(
    Serialize, Debug, PartialEq, Eq, EnumString, Display, Clone, Copy, Hash,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionType {
    PerKey,
    PerUser,
    PerRole,
}

#[derive(
    Serialize, Debug, PartialEq, Eq, EnumString, Display, Clone, Copy, Hash,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    Integer,
    Decimal,
    Text,
    User,
    Role,
    Channel,
    // Reserved, values never validate against these
    IntegerList,
    DecimalList,
    TextList,
    UserList,
    RoleList,
    ChannelList,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Decimal)
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            DataType::IntegerList
                | DataType::DecimalList
                | DataType::TextList
                | DataType::UserList
                | DataType::RoleList
                | DataType::ChannelList
        )
    }
}

/// Everything a caller can use to point at a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableRef {
    ById(TableId),
    ByName(String),
    ByExternalId(ExternalId),
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::ById(id) => write!(f, "id:{id}"),
            TableRef::ByName(name) => write!(f, "{name}"),
            TableRef::ByExternalId(id) => write!(f, "ext:{id}"),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::ByName(name.to_string())
    }
}

impl From<TableId> for TableRef {
    fn from(id: TableId) -> Self {
        TableRef::ById(id)
    }
}

// Command-line form: `id:<n>`, `ext:<n>` or a bare table name
impl FromStr for TableRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("id:") {
            id.parse()
                .map(TableRef::ById)
                .map_err(|e| format!("invalid table id {id:?}: {e}"))
        } else if let Some(id) = s.strip_prefix("ext:") {
            id.parse()
                .map(TableRef::ByExternalId)
                .map_err(|e| format!("invalid external id {id:?}: {e}"))
        } else {
            Ok(TableRef::ByName(s.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    ById(ColumnId),
    ByName(TableRef, String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::ById(id) => write!(f, "id:{id}"),
            ColumnRef::ByName(table, name) => write!(f, "{table}.{name}"),
        }
    }
}

/// Picks a single row of a table, either by its number or by its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelector {
    Number(RowNumber),
    Key(String),
}

impl fmt::Display for RowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSelector::Number(number) => write!(f, "row {number}"),
            RowSelector::Key(key) => write!(f, "key {key:?}"),
        }
    }
}

// External ids are u64 but both backends only have signed 64-bit integers, so
// we store the bit-identical reinterpretation.
pub fn external_id_to_db(id: ExternalId) -> i64 {
    id as i64
}

pub fn external_id_from_db(id: i64) -> ExternalId {
    id as u64
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub id: TableId,
    pub name: String,
    pub collection_type: CollectionType,
    pub external_id: Option<ExternalId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub id: ColumnId,
    pub table_id: TableId,
    pub name: String,
    pub data_type: DataType,
}

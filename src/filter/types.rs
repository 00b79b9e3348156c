use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,
    #[serde(rename = "$in")] In,
}

impl FilterOp {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "$eq" => FilterOp::Eq,
            "$ne" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            _ => return None,
        })
    }

    /// SQL operator for scalar comparisons; `None` for set membership
    pub fn comparison(&self) -> Option<&'static str> {
        match self {
            FilterOp::Eq => Some("="),
            FilterOp::Ne => Some("<>"),
            FilterOp::Gt => Some(">"),
            FilterOp::Gte => Some(">="),
            FilterOp::Lt => Some("<"),
            FilterOp::Lte => Some("<="),
            FilterOp::In => None,
        }
    }
}

/// Storage type of a column, used to cast bound parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Uuid,
    Timestamp,
    Json,
    TextArray,
    UuidArray,
    TimestampArray,
}

impl ColumnKind {
    /// Cast applied to a bound parameter compared against this column
    /// (for array columns: against one element)
    pub fn param_cast(&self) -> Option<&'static str> {
        match self {
            ColumnKind::Text | ColumnKind::TextArray => Some("::text"),
            ColumnKind::Integer => Some("::int8"),
            ColumnKind::Float => Some("::float8"),
            ColumnKind::Boolean => Some("::boolean"),
            ColumnKind::Uuid | ColumnKind::UuidArray => Some("::uuid"),
            ColumnKind::Timestamp | ColumnKind::TimestampArray => Some("::timestamptz"),
            ColumnKind::Json => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ColumnKind::TextArray | ColumnKind::UuidArray | ColumnKind::TimestampArray)
    }

    pub fn is_filterable(&self) -> bool {
        !matches!(self, ColumnKind::Json)
    }
}

/// Column of a model table. Hidden columns can be filtered internally
/// but are never selected for or filtered by API clients.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub readable: bool,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, readable: true }
    }

    pub const fn hidden(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, readable: false }
    }
}

pub fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a Column> {
    columns.iter().find(|c| c.name == name)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub select: Option<Vec<String>>,
    #[serde(rename = "where")]
    pub where_clause: Option<serde_json::Value>,
    pub order: Option<serde_json::Value>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<serde_json::Value>,
}

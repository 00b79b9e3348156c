use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{find_column, Column, FilterData, FilterOrderInfo, SqlResult};

/// SQL builder for one model table. Column names are checked against the
/// table schema before they reach the query text; values are always bound.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: &'static str,
    columns: &'static [Column],
    select_columns: Vec<String>,
    where_data: Vec<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(table_name: &'static str, columns: &'static [Column]) -> Result<Self, FilterError> {
        Self::validate_identifier(table_name)
            .map_err(|_| FilterError::InvalidTableName(format!("Invalid table name format: {}", table_name)))?;
        Ok(Self {
            table_name,
            columns,
            select_columns: vec![],
            where_data: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select {
            self.select(select)?;
        }
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if let Some(limit) = data.limit {
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            Self::validate_identifier(column)?;
            match find_column(self.columns, column) {
                Some(c) if c.readable => {}
                _ => return Err(FilterError::InvalidColumn(column.clone())),
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    /// Adds a condition object; successive calls are ANDed together.
    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        if !conditions.is_null() {
            self.where_data.push(conditions);
        }
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec, self.columns)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        let max_limit = crate::config::config().query.max_limit;
        let applied_limit = if limit > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    /// Typed query returning whole rows, for `FromRow` mapping.
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        self.build_query("*".to_string())
    }

    /// Query returning one `doc` JSON object per row holding the selected
    /// columns, or every readable column when no selection was made.
    pub fn to_json_sql(&self) -> Result<SqlResult, FilterError> {
        let pairs: Vec<String> = self
            .projected_columns()
            .iter()
            .map(|c| format!("'{}', \"{}\"", c, c))
            .collect();
        self.build_query(format!("json_build_object({}) AS doc", pairs.join(", ")))
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(&self.where_data, self.columns, 0)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn projected_columns(&self) -> Vec<&str> {
        if self.select_columns.is_empty() {
            self.columns.iter().filter(|c| c.readable).map(|c| c.name).collect()
        } else {
            self.select_columns.iter().map(String::as_str).collect()
        }
    }

    fn build_query(&self, select_clause: String) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = [
            format!("SELECT {}", select_clause),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    fn validate_identifier(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        };
        if valid {
            Ok(())
        } else {
            Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", name)))
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::ColumnKind;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::new("id", ColumnKind::Uuid),
        Column::new("name", ColumnKind::Text),
        Column::new("price", ColumnKind::Float),
        Column::hidden("password", ColumnKind::Text),
    ];

    #[test]
    fn builds_full_query() {
        let mut filter = Filter::new("tours", COLUMNS).unwrap();
        filter
            .where_clause(json!({ "price": { "$lt": 500 } }))
            .unwrap()
            .order(json!("price desc"))
            .unwrap()
            .limit(5, Some(5))
            .unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"tours\" WHERE \"price\" < $1::float8 ORDER BY \"price\" DESC LIMIT 5 OFFSET 5"
        );
        assert_eq!(sql.params, vec![json!(500)]);
    }

    #[test]
    fn json_projection_defaults_to_readable_columns() {
        let filter = Filter::new("users", COLUMNS).unwrap();
        let sql = filter.to_json_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT json_build_object('id', \"id\", 'name', \"name\", 'price', \"price\") AS doc FROM \"users\""
        );
    }

    #[test]
    fn select_rejects_hidden_columns() {
        let mut filter = Filter::new("users", COLUMNS).unwrap();
        assert!(filter.select(vec!["password".into()]).is_err());
        assert!(filter.select(vec!["name; drop".into()]).is_err());
        assert!(filter.select(vec!["id".into(), "name".into()]).is_ok());
    }

    #[test]
    fn count_shares_where_clause() {
        let mut filter = Filter::new("tours", COLUMNS).unwrap();
        filter.where_clause(json!({ "name": "x" })).unwrap();
        filter.where_clause(json!({ "price": 10 })).unwrap();
        let sql = filter.to_count_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT COUNT(*) AS count FROM \"tours\" WHERE \"name\" = $1::text AND \"price\" = $2::float8"
        );
    }

    #[test]
    fn rejects_bad_table_name() {
        assert!(matches!(Filter::new("tours;--", COLUMNS), Err(FilterError::InvalidTableName(_))));
    }
}

use serde_json::Value;

use super::error::FilterError;
use super::types::{find_column, Column, FilterOp};

/// Builds a parameterized WHERE clause from `{ field: value }` /
/// `{ field: { "$op": value } }` condition objects. Every object passed in
/// is ANDed with the others.
pub struct FilterWhere<'a> {
    columns: &'a [Column],
    param_values: Vec<Value>,
    param_index: usize,
}

impl<'a> FilterWhere<'a> {
    pub fn new(columns: &'a [Column], starting_param_index: usize) -> Self {
        Self {
            columns,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(
        where_data: &[Value],
        columns: &'a [Column],
        starting_param_index: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(columns, starting_param_index);
        let mut sql_conditions = vec![];
        for conditions in where_data {
            sql_conditions.extend(filter_where.parse_where_data(conditions)?);
        }
        Ok((sql_conditions.join(" AND "), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Object(_) | Value::Null => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_where_data(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => {
                let mut out = vec![];
                for (field, value) in obj {
                    out.extend(self.parse_field_condition(field, value)?);
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        let column = *find_column(self.columns, field)
            .ok_or_else(|| FilterError::InvalidColumn(field.to_string()))?;
        if !column.kind.is_filterable() {
            return Err(FilterError::InvalidColumn(format!("{} cannot be filtered", field)));
        }

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                let mut out = vec![];
                for (op_key, op_val) in obj {
                    let operator = FilterOp::from_key(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.to_string()))?;
                    out.push(self.build_sql_condition(&column, operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_sql_condition(&column, FilterOp::Eq, value)?]),
        }
    }

    fn build_sql_condition(&mut self, column: &Column, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column.name);
        let cast = column.kind.param_cast().unwrap_or("");

        match operator {
            FilterOp::Eq | FilterOp::Ne if data.is_null() => {
                let test = if operator == FilterOp::Eq { "IS NULL" } else { "IS NOT NULL" };
                Ok(format!("{} {}", quoted_column, test))
            }
            FilterOp::In => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                if values.iter().any(|v| v.is_null() || v.is_array() || v.is_object()) {
                    return Err(FilterError::InvalidOperatorData("$in requires scalar values".to_string()));
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v, cast)).collect();
                if column.kind.is_array() {
                    Ok(format!("{} && ARRAY[{}]", quoted_column, params.join(", ")))
                } else {
                    Ok(format!("{} IN ({})", quoted_column, params.join(", ")))
                }
            }
            _ => {
                if data.is_null() || data.is_array() || data.is_object() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} requires a scalar value",
                        column.name
                    )));
                }
                let sql_op = operator.comparison().unwrap_or("=");
                if column.kind.is_array() {
                    // Array columns only support membership
                    return match operator {
                        FilterOp::Eq => Ok(format!("{} = ANY({})", self.param(data.clone(), cast), quoted_column)),
                        FilterOp::Ne => Ok(format!("NOT ({} = ANY({}))", self.param(data.clone(), cast), quoted_column)),
                        _ => Err(FilterError::UnsupportedOperator(format!("{} on array column {}", sql_op, column.name))),
                    };
                }
                Ok(format!("{} {} {}", quoted_column, sql_op, self.param(data.clone(), cast)))
            }
        }
    }

    fn param(&mut self, value: Value, cast: &str) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}{}", self.param_index, cast)
    }
}

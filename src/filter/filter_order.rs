use serde_json::Value;

use super::error::FilterError;
use super::types::{find_column, Column, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parses `"price desc, name"`, `["price desc", "name"]` or
    /// `{ "price": "desc" }` into validated order terms.
    pub fn validate_and_parse(order: &Value, columns: &[Column]) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        _ => return Err(FilterError::InvalidOrder("order entries must be strings".to_string())),
                    }
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = Self::parse_direction(v.as_str().unwrap_or("asc"))?;
                    out.push(FilterOrderInfo { column: k.clone(), sort });
                }
                out
            }
            Value::Null => vec![],
            _ => return Err(FilterError::InvalidOrder("Unsupported order format".to_string())),
        };

        for info in &infos {
            match find_column(columns, &info.column) {
                Some(column) if column.readable => {}
                _ => return Err(FilterError::InvalidColumn(info.column.clone())),
            }
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOrder(format!("Invalid sort direction '{}'", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::ColumnKind;
    use serde_json::json;

    const COLUMNS: &[Column] = &[
        Column::new("price", ColumnKind::Float),
        Column::new("name", ColumnKind::Text),
        Column::hidden("password", ColumnKind::Text),
    ];

    #[test]
    fn parses_all_forms() {
        let expected = vec![
            FilterOrderInfo { column: "price".into(), sort: SortDirection::Desc },
            FilterOrderInfo { column: "name".into(), sort: SortDirection::Asc },
        ];
        assert_eq!(FilterOrder::validate_and_parse(&json!("price desc, name"), COLUMNS).unwrap(), expected);
        assert_eq!(FilterOrder::validate_and_parse(&json!(["price DESC", "name"]), COLUMNS).unwrap(), expected);
        assert_eq!(
            FilterOrder::generate(&expected),
            "ORDER BY \"price\" DESC, \"name\" ASC"
        );
    }

    #[test]
    fn rejects_hidden_and_unknown_columns() {
        assert!(FilterOrder::validate_and_parse(&json!("password"), COLUMNS).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("nope desc"), COLUMNS).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("price sideways"), COLUMNS).is_err());
    }
}

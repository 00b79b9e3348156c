use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::config;
use crate::filter::{find_column, Column, FilterData, FilterError};

/// Query-string keys that shape the result instead of filtering it
const RESERVED_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Unsupported filter operator '{0}'")]
    UnknownOperator(String),

    #[error("Projection cannot mix included and excluded fields")]
    MixedProjection,

    #[error("Invalid {0}: must be a positive integer")]
    InvalidNumber(&'static str),

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Turns a list request's query string into [`FilterData`]:
/// `filter`, `sort`, `limit_fields` and `paginate`, applied in a chain.
///
/// ```text
/// ?difficulty=easy&price[lt]=1500&sort=-price,name&fields=name,price&page=2&limit=5
/// ```
pub struct QueryFeatures {
    params: Vec<(String, String)>,
    columns: &'static [Column],
    data: FilterData,
    page: i64,
    limit: i64,
}

impl QueryFeatures {
    pub fn new(query: Option<&str>, columns: &'static [Column]) -> Self {
        let params = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self {
            params,
            columns,
            data: FilterData::default(),
            page: 1,
            limit: config().query.default_limit,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    fn last(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn readable(&self, name: &str) -> Result<&'static Column, FeatureError> {
        match find_column(self.columns, name) {
            Some(column) if column.readable => Ok(column),
            _ => Err(FeatureError::UnknownField(name.to_string())),
        }
    }

    /// `field=v` is equality, `field[op]=v` a comparison, a repeated plain
    /// `field` becomes set membership.
    pub fn filter(mut self) -> Result<Self, FeatureError> {
        let mut equals: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut operators: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

        for (key, value) in &self.params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let (field, op) = split_operator(key)?;
            let column = self.readable(field)?;
            if !column.kind.is_filterable() {
                return Err(FeatureError::UnknownField(field.to_string()));
            }
            match op {
                None => equals.entry(field.to_string()).or_default().push(value.clone()),
                Some(op) => {
                    operators
                        .entry(field.to_string())
                        .or_default()
                        .insert(op.to_string(), json!(value));
                }
            }
        }

        let mut conditions = Map::new();
        for (field, mut values) in equals {
            let ops = operators.remove(&field);
            let condition = match (values.len(), ops) {
                (1, None) => json!(values.remove(0)),
                (1, Some(mut ops)) => {
                    ops.insert("$eq".to_string(), json!(values.remove(0)));
                    Value::Object(ops)
                }
                (_, ops) => {
                    let mut ops = ops.unwrap_or_default();
                    ops.insert("$in".to_string(), json!(values));
                    Value::Object(ops)
                }
            };
            conditions.insert(field, condition);
        }
        for (field, ops) in operators {
            conditions.insert(field, Value::Object(ops));
        }

        if !conditions.is_empty() {
            self.data.where_clause = Some(Value::Object(conditions));
        }
        Ok(self)
    }

    /// Comma list, `-` prefix for descending. Newest first by default;
    /// `id` always breaks ties so pages are stable.
    pub fn sort(mut self) -> Result<Self, FeatureError> {
        let mut order = vec![];
        match self.last("sort").filter(|s| !s.trim().is_empty()) {
            Some(sort) => {
                for term in sort.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    let (name, direction) = match term.strip_prefix('-') {
                        Some(name) => (name, "desc"),
                        None => (term, "asc"),
                    };
                    self.readable(name)?;
                    order.push(format!("{} {}", name, direction));
                }
            }
            None => {
                if find_column(self.columns, "created_at").is_some() {
                    order.push("created_at desc".to_string());
                }
            }
        }
        if !order.iter().any(|o| o.split_whitespace().next() == Some("id")) {
            order.push("id asc".to_string());
        }
        self.data.order = Some(json!(order));
        Ok(self)
    }

    /// `fields=a,b` keeps only those (plus `id`); `fields=-a,-b` drops them.
    pub fn limit_fields(mut self) -> Result<Self, FeatureError> {
        let Some(fields) = self.last("fields") else {
            return Ok(self);
        };
        let terms: Vec<&str> = fields.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Ok(self);
        }

        let excluded: Vec<&str> = terms.iter().filter_map(|t| t.strip_prefix('-')).collect();
        let select = if excluded.is_empty() {
            let mut select = vec!["id".to_string()];
            for name in terms {
                self.readable(name)?;
                if !select.iter().any(|s| s == name) {
                    select.push(name.to_string());
                }
            }
            select
        } else if excluded.len() == terms.len() {
            for name in &excluded {
                self.readable(name)?;
            }
            self.columns
                .iter()
                .filter(|c| c.readable && !excluded.contains(&c.name))
                .map(|c| c.name.to_string())
                .collect()
        } else {
            return Err(FeatureError::MixedProjection);
        };

        self.data.select = Some(select);
        Ok(self)
    }

    /// `page` from 1, `limit` capped at the configured maximum
    pub fn paginate(mut self) -> Result<Self, FeatureError> {
        if let Some(page) = self.last("page") {
            self.page = positive(page).ok_or(FeatureError::InvalidNumber("page"))?;
        }
        if let Some(limit) = self.last("limit") {
            self.limit = positive(limit).ok_or(FeatureError::InvalidNumber("limit"))?;
        }
        self.limit = self.limit.min(config().query.max_limit);

        let offset = (self.page - 1)
            .checked_mul(self.limit)
            .ok_or(FeatureError::InvalidNumber("page"))?;
        self.data.limit = Some(self.limit);
        self.data.offset = Some(offset);
        Ok(self)
    }

    pub fn into_filter_data(self) -> FilterData {
        self.data
    }
}

fn positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n > 0)
}

/// `price[gte]` -> (`price`, Some(`$gte`))
fn split_operator(key: &str) -> Result<(&str, Option<&'static str>), FeatureError> {
    let Some((field, rest)) = key.split_once('[') else {
        return Ok((key, None));
    };
    let op = match rest.strip_suffix(']') {
        Some("gte") => "$gte",
        Some("gt") => "$gt",
        Some("lte") => "$lte",
        Some("lt") => "$lt",
        Some("ne") => "$ne",
        _ => return Err(FeatureError::UnknownOperator(key.to_string())),
    };
    Ok((field, Some(op)))
}

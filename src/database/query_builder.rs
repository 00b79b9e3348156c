use serde_json::Value;
use sqlx::{self, postgres::PgRow, FromRow, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::filter::{Filter, SqlResult};

/// Runs the SQL produced by a [`Filter`] with its parameters bound.
///
/// Parameters are bound as text and converted by the casts `Filter` puts
/// next to each placeholder, so query-string values need no type sniffing.
pub struct QueryBuilder<T> {
    filter: Filter,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_all(&self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = q.bind(bind_text(p));
        }
        Ok(q.fetch_all(pool).await?)
    }

    pub async fn select_optional(&self, pool: &PgPool) -> Result<Option<T>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = q.bind(bind_text(p));
        }
        Ok(q.fetch_optional(pool).await?)
    }

    /// One JSON document per row, holding only the projected columns
    pub async fn select_docs(&self, pool: &PgPool) -> Result<Vec<Value>, DatabaseError> {
        let rows = fetch_rows(pool, self.filter.to_json_sql()?).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("doc").map_err(DatabaseError::from))
            .collect()
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let rows = fetch_rows(pool, self.filter.to_count_sql()?).await?;
        let row = rows
            .first()
            .ok_or_else(|| DatabaseError::QueryError("COUNT returned no rows".to_string()))?;
        Ok(row.try_get::<i64, _>("count")?)
    }
}

async fn fetch_rows(pool: &PgPool, sql_result: SqlResult) -> Result<Vec<PgRow>, DatabaseError> {
    let mut q = sqlx::query(&sql_result.query);
    for p in sql_result.params.iter() {
        q = q.bind(bind_text(p));
    }
    Ok(q.fetch_all(pool).await?)
}

/// Text form of a scalar parameter; `None` binds SQL NULL
fn bind_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

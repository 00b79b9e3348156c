use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::Model;
use crate::database::query_builder::QueryBuilder;
use crate::filter::Filter;

/// Scoped reads for one model. Every query starts from [`Repository::filter`],
/// so the model's default scope is always applied.
pub struct Repository<M> {
    pool: PgPool,
    _phantom: std::marker::PhantomData<M>,
}

impl<M: Model> Repository<M> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    /// A filter over the model table with its scope already applied
    pub fn filter(&self) -> Result<Filter, DatabaseError> {
        let mut filter = Filter::new(M::TABLE, M::SCHEMA)?;
        if let Some(scope) = M::scope() {
            filter.where_clause(scope)?;
        }
        Ok(filter)
    }

    pub async fn select_docs(&self, filter: Filter) -> Result<Vec<Value>, DatabaseError> {
        QueryBuilder::<M>::new(filter).select_docs(&self.pool).await
    }

    pub async fn count(&self, filter: Filter) -> Result<i64, DatabaseError> {
        QueryBuilder::<M>::new(filter).count(&self.pool).await
    }

    pub async fn select_any(&self, conditions: Value) -> Result<Vec<M>, DatabaseError> {
        let mut filter = self.filter()?;
        filter.where_clause(conditions)?;
        QueryBuilder::<M>::new(filter).select_all(&self.pool).await
    }

    pub async fn select_one(&self, conditions: Value) -> Result<Option<M>, DatabaseError> {
        let mut filter = self.filter()?;
        filter.where_clause(conditions)?;
        filter.limit(1, None)?;
        QueryBuilder::<M>::new(filter).select_optional(&self.pool).await
    }

    pub async fn select_404(&self, id: Uuid) -> Result<M, DatabaseError> {
        self.select_one(json!({ "id": id }))
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No {} found with that ID", M::NAME)))
    }

    pub async fn select_ids(&self, ids: &[Uuid]) -> Result<Vec<M>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.select_any(json!({ "id": { "$in": ids } })).await
    }
}

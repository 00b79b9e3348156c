pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::database::manager::DatabaseError;
use crate::filter::Column;

pub use booking::{Booking, BookingCreate, BookingUpdate};
pub use review::{Review, ReviewCreate, ReviewUpdate};
pub use tour::{GeoPoint, Tour, TourInput};
pub use user::{PasswordChange, ProfileUpdate, Role, User, UserCreate, UserUpdate};

/// A record type stored in its own table and served by the generic
/// CRUD handlers.
#[async_trait]
pub trait Model: for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + Sized + 'static {
    /// Lowercase display name used in messages
    const NAME: &'static str;
    const TABLE: &'static str;
    const SCHEMA: &'static [Column];

    type Create: DeserializeOwned + Validate + Send + 'static;
    type Update: DeserializeOwned + Serialize + Validate + Send + 'static;

    fn id(&self) -> Uuid;

    /// Conditions ANDed into every read of this model
    fn scope() -> Option<Value> {
        None
    }

    /// The current record as a complete update payload
    fn to_update(&self) -> Self::Update;

    async fn insert(pool: &PgPool, data: Self::Create) -> Result<Self, DatabaseError>;

    async fn update(pool: &PgPool, id: Uuid, data: Self::Update) -> Result<Self, DatabaseError>;

    async fn delete(pool: &PgPool, id: Uuid) -> Result<Self, DatabaseError> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = $1 RETURNING *", Self::TABLE);
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No {} found with that ID", Self::NAME)))
    }

    /// Runs after every successful insert, update and delete
    async fn after_write(&self, _pool: &PgPool) -> Result<(), DatabaseError> {
        Ok(())
    }

    /// Replaces reference ids in outgoing documents with the referenced records
    async fn populate(_pool: &PgPool, _docs: &mut [Value]) -> Result<(), DatabaseError> {
        Ok(())
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|_| DatabaseError::InvalidId(raw.to_string()))
}

/// Distinct ids found under `key` in the documents; `key` may hold one id
/// or an array of ids.
pub(crate) fn collect_ids(docs: &[Value], key: &str) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = docs
        .iter()
        .filter_map(|doc| doc.get(key))
        .flat_map(|value| match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .filter_map(|value| value.as_str().and_then(|s| Uuid::parse_str(s).ok()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

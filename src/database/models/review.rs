use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::{collect_ids, Model, User};
use crate::database::manager::DatabaseError;
use crate::filter::{Column, ColumnKind};
use crate::services::ratings;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: f64,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

pub const REVIEW_SCHEMA: &[Column] = &[
    Column::new("id", ColumnKind::Uuid),
    Column::new("review", ColumnKind::Text),
    Column::new("rating", ColumnKind::Float),
    Column::new("tour_id", ColumnKind::Uuid),
    Column::new("user_id", ColumnKind::Uuid),
    Column::new("created_at", ColumnKind::Timestamp),
];

/// `tour_id` and `user_id` may be omitted in the body when the route
/// supplies them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewCreate {
    #[validate(length(min = 1, max = 200, message = "Review must have between 1 and 200 characters"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,
    #[validate(required(message = "Review must belong to a tour"))]
    pub tour_id: Option<Uuid>,
    #[validate(required(message = "Review must belong to a user"))]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReviewUpdate {
    #[validate(length(min = 1, max = 200, message = "Review must have between 1 and 200 characters"))]
    pub review: String,
    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1 and 5"))]
    pub rating: f64,
}

#[async_trait]
impl Model for Review {
    const NAME: &'static str = "review";
    const TABLE: &'static str = "reviews";
    const SCHEMA: &'static [Column] = REVIEW_SCHEMA;

    type Create = ReviewCreate;
    type Update = ReviewUpdate;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_update(&self) -> ReviewUpdate {
        ReviewUpdate {
            review: self.review.clone(),
            rating: self.rating,
        }
    }

    async fn insert(pool: &PgPool, data: ReviewCreate) -> Result<Self, DatabaseError> {
        let (tour_id, user_id) = match (data.tour_id, data.user_id) {
            (Some(tour_id), Some(user_id)) => (tour_id, user_id),
            _ => return Err(DatabaseError::QueryError("review needs a tour and a user".to_string())),
        };
        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (review, rating, tour_id, user_id) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(data.review.trim())
        .bind(data.rating)
        .bind(tour_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(review)
    }

    async fn update(pool: &PgPool, id: Uuid, data: ReviewUpdate) -> Result<Self, DatabaseError> {
        let review = sqlx::query_as::<_, Review>(
            "UPDATE reviews SET review = $2, rating = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(data.review.trim())
        .bind(data.rating)
        .fetch_optional(pool)
        .await?;
        review.ok_or_else(|| DatabaseError::NotFound("No review found with that ID".to_string()))
    }

    async fn after_write(&self, pool: &PgPool) -> Result<(), DatabaseError> {
        ratings::recalculate(pool, self.tour_id).await
    }

    /// Embeds the author's name and photo as `user`
    async fn populate(pool: &PgPool, docs: &mut [Value]) -> Result<(), DatabaseError> {
        let ids = collect_ids(docs, "user_id");
        if ids.is_empty() {
            return Ok(());
        }
        let users = User::lookup(pool, &ids).await?;
        for doc in docs.iter_mut() {
            let author = doc
                .get("user_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .and_then(|id| users.get(&id))
                .map(User::summary);
            if let (Some(author), Value::Object(map)) = (author, doc) {
                map.insert("user".to_string(), author);
            }
        }
        Ok(())
    }
}

impl Review {
    /// Inserts with a caller-chosen id, for seeding. Rating caches are not
    /// touched; recompute them once the import is done.
    pub async fn import(conn: &mut PgConnection, id: Uuid, data: ReviewCreate) -> Result<Review, DatabaseError> {
        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (id, review, rating, tour_id, user_id) VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(id)
        .bind(data.review.trim())
        .bind(data.rating)
        .bind(data.tour_id)
        .bind(data.user_id)
        .fetch_one(conn)
        .await?;
        Ok(review)
    }

    /// Reviews of one tour with their authors, newest first
    pub async fn for_tour(pool: &PgPool, tour_id: Uuid) -> Result<Vec<Value>, DatabaseError> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE tour_id = $1 ORDER BY created_at DESC, id",
        )
        .bind(tour_id)
        .fetch_all(pool)
        .await?;
        let mut docs: Vec<Value> = reviews.iter().map(|r| json!(r)).collect();
        Self::populate(pool, &mut docs).await?;
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: f64) -> ReviewCreate {
        ReviewCreate {
            review: "Amazing tour, would go again".to_string(),
            rating,
            tour_id: Some(Uuid::new_v4()),
            user_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn rating_must_be_between_one_and_five() {
        assert!(review(1.0).validate().is_ok());
        assert!(review(5.0).validate().is_ok());
        assert!(review(0.5).validate().is_err());
        assert!(review(6.0).validate().is_err());
    }

    #[test]
    fn review_text_is_bounded() {
        let mut data = review(4.0);
        data.review = "x".repeat(201);
        assert!(data.validate().is_err());
        data.review = String::new();
        assert!(data.validate().is_err());
    }

    #[test]
    fn tour_and_user_are_required() {
        let mut data = review(4.0);
        data.tour_id = None;
        let errors = data.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("tour_id"));
    }

    #[test]
    fn update_keeps_rating_range() {
        let update = ReviewUpdate { review: "ok".to_string(), rating: 0.0 };
        assert!(update.validate().is_err());
    }
}

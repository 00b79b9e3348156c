use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{collect_ids, Model, Tour, User};
use crate::database::manager::DatabaseError;
use crate::database::repository::Repository;
use crate::filter::{Column, ColumnKind};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub price: f64,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

pub const BOOKING_SCHEMA: &[Column] = &[
    Column::new("id", ColumnKind::Uuid),
    Column::new("tour_id", ColumnKind::Uuid),
    Column::new("user_id", ColumnKind::Uuid),
    Column::new("price", ColumnKind::Float),
    Column::new("paid", ColumnKind::Boolean),
    Column::new("created_at", ColumnKind::Timestamp),
];

fn validate_booking_price(price: f64) -> Result<(), ValidationError> {
    if price <= 0.0 {
        let mut err = ValidationError::new("price");
        err.message = Some("Booking must have a price".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingCreate {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    #[validate(custom(function = "validate_booking_price"))]
    pub price: f64,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

fn default_paid() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookingUpdate {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    #[validate(custom(function = "validate_booking_price"))]
    pub price: f64,
    pub paid: bool,
}

#[async_trait]
impl Model for Booking {
    const NAME: &'static str = "booking";
    const TABLE: &'static str = "bookings";
    const SCHEMA: &'static [Column] = BOOKING_SCHEMA;

    type Create = BookingCreate;
    type Update = BookingUpdate;

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_update(&self) -> BookingUpdate {
        BookingUpdate {
            tour_id: self.tour_id,
            user_id: self.user_id,
            price: self.price,
            paid: self.paid,
        }
    }

    async fn insert(pool: &PgPool, data: BookingCreate) -> Result<Self, DatabaseError> {
        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (tour_id, user_id, price, paid) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(data.tour_id)
        .bind(data.user_id)
        .bind(data.price)
        .bind(data.paid)
        .fetch_one(pool)
        .await?;
        Ok(booking)
    }

    async fn update(pool: &PgPool, id: Uuid, data: BookingUpdate) -> Result<Self, DatabaseError> {
        let booking = sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET tour_id = $2, user_id = $3, price = $4, paid = $5 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(data.tour_id)
        .bind(data.user_id)
        .bind(data.price)
        .bind(data.paid)
        .fetch_optional(pool)
        .await?;
        booking.ok_or_else(|| DatabaseError::NotFound("No booking found with that ID".to_string()))
    }

    /// Embeds the booking user and the tour name
    async fn populate(pool: &PgPool, docs: &mut [Value]) -> Result<(), DatabaseError> {
        let users = User::lookup(pool, &collect_ids(docs, "user_id")).await?;
        let tour_ids = collect_ids(docs, "tour_id");
        let tours: HashMap<Uuid, Tour> = Repository::<Tour>::new(pool.clone())
            .select_ids(&tour_ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        for doc in docs.iter_mut() {
            let user = reference(doc, "user_id").and_then(|id| users.get(&id)).map(User::summary);
            let tour = reference(doc, "tour_id")
                .and_then(|id| tours.get(&id))
                .map(|t| json!({ "id": t.id, "name": t.name }));
            if let Value::Object(map) = doc {
                if let Some(user) = user {
                    map.insert("user".to_string(), user);
                }
                if let Some(tour) = tour {
                    map.insert("tour".to_string(), tour);
                }
            }
        }
        Ok(())
    }
}

fn reference(doc: &Value, key: &str) -> Option<Uuid> {
    doc.get(key).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

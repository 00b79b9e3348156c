use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{collect_ids, Model, User};
use crate::database::manager::DatabaseError;
use crate::filter::{Column, ColumnKind};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "difficult"];

/// GeoJSON point with optional description. `coordinates` is `[lng, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoPoint {
    #[serde(rename = "type", default = "default_point_type")]
    #[validate(custom(function = "validate_point_type"))]
    pub kind: String,
    #[validate(custom(function = "validate_coordinates"))]
    pub coordinates: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

fn default_point_type() -> String {
    "Point".to_string()
}

fn validate_point_type(kind: &str) -> Result<(), ValidationError> {
    if kind != "Point" {
        let mut err = ValidationError::new("point");
        err.message = Some("Location type must be 'Point'".into());
        return Err(err);
    }
    Ok(())
}

fn validate_coordinates(coordinates: &[f64]) -> Result<(), ValidationError> {
    let valid = matches!(coordinates, [lng, lat] if (-180.0..=180.0).contains(lng) && (-90.0..=90.0).contains(lat));
    if !valid {
        let mut err = ValidationError::new("coordinates");
        err.message = Some("Coordinates must be [longitude, latitude]".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub duration_weeks: f64,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
    pub start_location: Option<Json<GeoPoint>>,
    pub locations: Json<Vec<GeoPoint>>,
    pub guides: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

pub const TOUR_SCHEMA: &[Column] = &[
    Column::new("id", ColumnKind::Uuid),
    Column::new("name", ColumnKind::Text),
    Column::new("slug", ColumnKind::Text),
    Column::new("duration", ColumnKind::Integer),
    Column::new("duration_weeks", ColumnKind::Float),
    Column::new("max_group_size", ColumnKind::Integer),
    Column::new("difficulty", ColumnKind::Text),
    Column::new("ratings_average", ColumnKind::Float),
    Column::new("ratings_quantity", ColumnKind::Integer),
    Column::new("price", ColumnKind::Float),
    Column::new("price_discount", ColumnKind::Float),
    Column::new("summary", ColumnKind::Text),
    Column::new("description", ColumnKind::Text),
    Column::new("image_cover", ColumnKind::Text),
    Column::new("images", ColumnKind::TextArray),
    Column::new("start_dates", ColumnKind::TimestampArray),
    Column::new("secret_tour", ColumnKind::Boolean),
    Column::new("start_location", ColumnKind::Json),
    Column::new("locations", ColumnKind::Json),
    Column::new("guides", ColumnKind::UuidArray),
    Column::new("created_at", ColumnKind::Timestamp),
];

/// Tour payload for both create and update. Updates are merged onto the
/// stored tour first, so every rule here holds for the final record.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_discount"))]
pub struct TourInput {
    #[validate(custom(function = "validate_tour_name"))]
    pub name: String,
    #[validate(range(min = 1, message = "A tour must have a duration"))]
    pub duration: i32,
    #[validate(range(min = 1, message = "A tour must have a group size"))]
    pub max_group_size: i32,
    #[validate(custom(function = "validate_difficulty"))]
    pub difficulty: String,
    #[validate(custom(function = "validate_price"))]
    pub price: f64,
    #[validate(range(min = 0.0, message = "Discount price cannot be negative"))]
    pub price_discount: Option<f64>,
    #[validate(custom(function = "validate_summary"))]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_cover: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(default)]
    #[validate(nested)]
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    #[validate(nested)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<Uuid>,
}

fn validate_tour_name(name: &str) -> Result<(), ValidationError> {
    let len = name.trim().chars().count();
    if !(10..=40).contains(&len) {
        let mut err = ValidationError::new("length");
        err.message = Some("A tour name must have between 10 and 40 characters".into());
        return Err(err);
    }
    Ok(())
}

fn validate_difficulty(difficulty: &str) -> Result<(), ValidationError> {
    if !DIFFICULTIES.contains(&difficulty) {
        let mut err = ValidationError::new("difficulty");
        err.message = Some("Difficulty is either: easy, medium, difficult".into());
        return Err(err);
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ValidationError> {
    if price <= 0.0 {
        let mut err = ValidationError::new("price");
        err.message = Some("A tour price must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_summary(summary: &str) -> Result<(), ValidationError> {
    if summary.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("A tour must have a summary".into());
        return Err(err);
    }
    Ok(())
}

fn validate_discount(tour: &TourInput) -> Result<(), ValidationError> {
    match tour.price_discount {
        Some(discount) if discount > tour.price => {
            let mut err = ValidationError::new("price_discount");
            err.message = Some(format!("Discount price ({}) should be below regular price", discount).into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// URL slug: lowercase, runs of non-alphanumerics collapsed to `-`
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

const TOUR_COLUMNS_SQL: &str = "name, slug, duration, max_group_size, difficulty, price, price_discount, \
     summary, description, image_cover, images, start_dates, secret_tour, start_location, locations, guides";

fn bind_input<'q>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, Tour, sqlx::postgres::PgArguments>,
    data: TourInput,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, Tour, sqlx::postgres::PgArguments> {
    let name = data.name.trim().to_string();
    let slug = slugify(&name);
    q.bind(name)
        .bind(slug)
        .bind(data.duration)
        .bind(data.max_group_size)
        .bind(data.difficulty)
        .bind(data.price)
        .bind(data.price_discount)
        .bind(data.summary.trim().to_string())
        .bind(data.description.map(|d| d.trim().to_string()))
        .bind(data.image_cover)
        .bind(data.images)
        .bind(data.start_dates)
        .bind(data.secret_tour)
        .bind(data.start_location.map(Json))
        .bind(Json(data.locations))
        .bind(data.guides)
}

impl Tour {
    /// Inserts with a caller-chosen id, for seeding
    pub async fn import(conn: &mut PgConnection, id: Uuid, data: TourInput) -> Result<Tour, DatabaseError> {
        let sql = format!(
            "INSERT INTO tours (id, {}) VALUES ($17, $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
            TOUR_COLUMNS_SQL
        );
        let tour = bind_input(sqlx::query_as::<_, Tour>(&sql), data)
            .bind(id)
            .fetch_one(conn)
            .await?;
        Ok(tour)
    }
}

#[async_trait]
impl Model for Tour {
    const NAME: &'static str = "tour";
    const TABLE: &'static str = "tours";
    const SCHEMA: &'static [Column] = TOUR_SCHEMA;

    type Create = TourInput;
    type Update = TourInput;

    fn id(&self) -> Uuid {
        self.id
    }

    fn scope() -> Option<Value> {
        Some(json!({ "secret_tour": { "$ne": true } }))
    }

    fn to_update(&self) -> TourInput {
        TourInput {
            name: self.name.clone(),
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty.clone(),
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary.clone(),
            description: self.description.clone(),
            image_cover: self.image_cover.clone(),
            images: self.images.clone(),
            start_dates: self.start_dates.clone(),
            secret_tour: self.secret_tour,
            start_location: self.start_location.as_ref().map(|p| p.0.clone()),
            locations: self.locations.0.clone(),
            guides: self.guides.clone(),
        }
    }

    async fn insert(pool: &PgPool, data: TourInput) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO tours ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
            TOUR_COLUMNS_SQL
        );
        let tour = bind_input(sqlx::query_as::<_, Tour>(&sql), data).fetch_one(pool).await?;
        Ok(tour)
    }

    async fn update(pool: &PgPool, id: Uuid, data: TourInput) -> Result<Self, DatabaseError> {
        let sql = format!(
            "UPDATE tours SET ({}) = ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             WHERE id = $17 RETURNING *",
            TOUR_COLUMNS_SQL
        );
        let tour = bind_input(sqlx::query_as::<_, Tour>(&sql), data)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        tour.ok_or_else(|| DatabaseError::NotFound("No tour found with that ID".to_string()))
    }

    /// Replaces guide ids with the guides' public profiles
    async fn populate(pool: &PgPool, docs: &mut [Value]) -> Result<(), DatabaseError> {
        let ids = collect_ids(docs, "guides");
        if ids.is_empty() {
            return Ok(());
        }
        let users = User::lookup(pool, &ids).await?;
        for doc in docs.iter_mut() {
            if let Some(Value::Array(guides)) = doc.get_mut("guides") {
                let populated: Vec<Value> = guides
                    .iter()
                    .filter_map(|id| id.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                    .filter_map(|id| users.get(&id))
                    .map(|guide| json!({ "id": guide.id, "name": guide.name, "email": guide.email, "photo": guide.photo, "role": guide.role }))
                    .collect();
                *guides = populated;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> TourInput {
        serde_json::from_value(json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "max_group_size": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "start_location": { "type": "Point", "coordinates": [-115.570154, 51.178456], "address": "224 Banff Ave, Banff, AB, Canada" }
        }))
        .unwrap()
    }

    #[test]
    fn valid_tour_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn negative_price_rejected() {
        let mut tour = input();
        tour.price = -10.0;
        let errors = tour.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price"));
    }

    #[test]
    fn discount_above_price_rejected() {
        let mut tour = input();
        tour.price_discount = Some(500.0);
        assert!(tour.validate().is_err());
        tour.price_discount = Some(100.0);
        assert!(tour.validate().is_ok());
    }

    #[test]
    fn lowering_price_below_existing_discount_rejected() {
        let mut stored = input();
        stored.price_discount = Some(300.0);
        assert!(stored.validate().is_ok());

        // Merge a price-only patch onto the stored tour
        let mut merged = serde_json::to_value(&stored).unwrap();
        merged["price"] = json!(200);
        let merged: TourInput = serde_json::from_value(merged).unwrap();
        assert!(merged.validate().is_err());
    }

    #[test]
    fn name_length_and_difficulty_checked() {
        let mut tour = input();
        tour.name = "Short".to_string();
        tour.difficulty = "extreme".to_string();
        let errors = tour.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("difficulty"));
    }

    #[test]
    fn bad_coordinates_rejected() {
        let mut tour = input();
        tour.locations = vec![GeoPoint {
            kind: "Point".to_string(),
            coordinates: vec![200.0, 10.0],
            address: None,
            description: None,
            day: Some(1),
        }];
        assert!(tour.validate().is_err());
    }

    #[test]
    fn slug_from_name() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  The Sea  Explorer! "), "the-sea-explorer");
    }
}

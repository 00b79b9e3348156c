use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::api::geo::{haversine_sql, LatLng, Unit};
use crate::database::manager::DatabaseError;
use crate::database::models::Tour;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DifficultyStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyStarts {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TourDistance {
    pub id: Uuid,
    pub name: String,
    pub distance: f64,
}

/// Aggregations over public (non-secret) tours
pub struct TourService {
    pool: PgPool,
}

impl TourService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Well-rated tours grouped by difficulty, cheapest group first
    pub async fn stats(&self) -> Result<Vec<DifficultyStats>, DatabaseError> {
        let stats = sqlx::query_as::<_, DifficultyStats>(
            r#"
            SELECT UPPER(difficulty) AS difficulty,
                   COUNT(*) AS num_tours,
                   COALESCE(SUM(ratings_quantity), 0)::int8 AS num_ratings,
                   AVG(ratings_average) AS avg_rating,
                   AVG(price) AS avg_price,
                   MIN(price) AS min_price,
                   MAX(price) AS max_price
            FROM tours
            WHERE secret_tour = FALSE AND ratings_average >= 4.5
            GROUP BY UPPER(difficulty)
            ORDER BY avg_price ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Tour starts per month of `year`, busiest month first
    pub async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyStarts>, DatabaseError> {
        let plan = sqlx::query_as::<_, MonthlyStarts>(
            r#"
            SELECT EXTRACT(MONTH FROM start_date AT TIME ZONE 'UTC')::int4 AS month,
                   COUNT(*) AS num_tour_starts,
                   ARRAY_AGG(name ORDER BY name) AS tours
            FROM tours, unnest(start_dates) AS start_date
            WHERE secret_tour = FALSE
              AND start_date >= make_timestamptz($1, 1, 1, 0, 0, 0, 'UTC')
              AND start_date < make_timestamptz($1 + 1, 1, 1, 0, 0, 0, 'UTC')
            GROUP BY 1
            ORDER BY num_tour_starts DESC, month ASC
            LIMIT 12
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;
        Ok(plan)
    }

    /// Tours whose start location lies within `distance` of `center`
    pub async fn within(&self, distance: f64, center: LatLng, unit: Unit) -> Result<Vec<Tour>, DatabaseError> {
        let radius = distance / unit.earth_radius();
        let sql = format!(
            "SELECT * FROM tours WHERE secret_tour = FALSE AND start_location IS NOT NULL \
             AND {} <= $3 ORDER BY created_at DESC, id",
            haversine_sql("start_location", "$1", "$2")
        );
        let tours = sqlx::query_as::<_, Tour>(&sql)
            .bind(center.lat)
            .bind(center.lng)
            .bind(radius)
            .fetch_all(&self.pool)
            .await?;
        Ok(tours)
    }

    /// Distance from `origin` to every tour start, nearest first
    pub async fn distances(&self, origin: LatLng, unit: Unit) -> Result<Vec<TourDistance>, DatabaseError> {
        let sql = format!(
            "SELECT id, name, {} * $3 AS distance FROM tours \
             WHERE secret_tour = FALSE AND start_location IS NOT NULL ORDER BY distance ASC, id",
            haversine_sql("start_location", "$1", "$2")
        );
        let distances = sqlx::query_as::<_, TourDistance>(&sql)
            .bind(origin.lat)
            .bind(origin.lng)
            .bind(unit.earth_radius())
            .fetch_all(&self.pool)
            .await?;
        Ok(distances)
    }
}

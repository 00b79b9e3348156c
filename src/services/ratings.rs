use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;

const RECALCULATE_SQL: &str = r#"
UPDATE tours SET
    ratings_quantity = stats.quantity,
    ratings_average = stats.average
FROM (
    SELECT COUNT(*)::int4 AS quantity,
           COALESCE(ROUND(AVG(rating)::numeric, 1)::float8, 4.5) AS average
    FROM reviews
    WHERE tour_id = $1
) AS stats
WHERE tours.id = $1
"#;

/// Recomputes a tour's cached rating aggregate from its reviews in one
/// statement. A tour without reviews falls back to 0 ratings averaging 4.5.
pub async fn recalculate(pool: &PgPool, tour_id: Uuid) -> Result<(), DatabaseError> {
    sqlx::query(RECALCULATE_SQL).bind(tour_id).execute(pool).await?;
    Ok(())
}

/// Recomputes the aggregate of every tour
pub async fn recalculate_all(pool: &PgPool) -> Result<u64, DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE tours SET
            ratings_quantity = COALESCE(stats.quantity, 0),
            ratings_average = COALESCE(stats.average, 4.5)
        FROM tours AS t
        LEFT JOIN (
            SELECT tour_id,
                   COUNT(*)::int4 AS quantity,
                   ROUND(AVG(rating)::numeric, 1)::float8 AS average
            FROM reviews
            GROUP BY tour_id
        ) AS stats ON stats.tour_id = t.id
        WHERE tours.id = t.id
        "#,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

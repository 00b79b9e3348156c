use anyhow::Context;
use clap::Subcommand;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use validator::Validate;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::models::{Review, ReviewCreate, Tour, TourInput, User, UserCreate};
use crate::database::DatabaseManager;
use crate::services::ratings;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "Import tours, users and reviews from JSON files")]
    Import {
        #[arg(long, default_value = "dev-data/data", help = "Directory holding tours.json, users.json and reviews.json")]
        dir: PathBuf,
    },

    #[command(about = "Delete all reviews, bookings, tours and users")]
    Delete,
}

/// One seed record: its fixed id plus the regular create payload
#[derive(Debug, Deserialize)]
struct Seed<T> {
    id: Uuid,
    #[serde(flatten)]
    data: T,
}

fn read_seeds<T: DeserializeOwned + Validate>(dir: &Path, file: &str) -> anyhow::Result<Vec<Seed<T>>> {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let seeds: Vec<Seed<T>> =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    for seed in &seeds {
        seed.data
            .validate()
            .with_context(|| format!("invalid record {} in {}", seed.id, path.display()))?;
    }
    Ok(seeds)
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DataCommands::Import { dir } => import(&dir, output_format).await,
        DataCommands::Delete => delete(output_format).await,
    }
}

async fn import(dir: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let tours = read_seeds::<TourInput>(dir, "tours.json")?;
    let users = read_seeds::<UserCreate>(dir, "users.json")?;
    let reviews = read_seeds::<ReviewCreate>(dir, "reviews.json")?;

    let pool = DatabaseManager::connect().await?;
    let mut tx = pool.begin().await?;

    // Users first: tours reference their guides, reviews their authors
    for seed in &users {
        User::import(&mut *tx, seed.id, seed.data.clone()).await?;
    }
    for seed in &tours {
        Tour::import(&mut *tx, seed.id, seed.data.clone()).await?;
    }
    for seed in &reviews {
        Review::import(&mut *tx, seed.id, seed.data.clone()).await?;
    }
    tx.commit().await?;

    let rated = ratings::recalculate_all(&pool).await?;
    tracing::info!("Recomputed ratings for {} tours", rated);

    output_success(
        output_format,
        "Data successfully loaded",
        Some(json!({
            "tours": tours.len(),
            "users": users.len(),
            "reviews": reviews.len(),
        })),
    )
}

async fn delete(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect().await?;
    let mut tx = pool.begin().await?;

    let mut deleted = serde_json::Map::new();
    for table in ["reviews", "bookings", "tours", "users"] {
        let result = sqlx::query(&format!("DELETE FROM {}", table)).execute(&mut *tx).await?;
        deleted.insert(table.to_string(), json!(result.rows_affected()));
    }
    tx.commit().await?;

    output_success(output_format, "Data successfully deleted", Some(serde_json::Value::Object(deleted)))
}

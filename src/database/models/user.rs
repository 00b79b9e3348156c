use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    FromRow, PgConnection, PgPool, Postgres,
};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::Model;
use crate::auth::password::hash_password;
use crate::database::manager::DatabaseError;
use crate::database::repository::Repository;
use crate::filter::{Column, ColumnKind};
use crate::services::ratings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// Stored as plain text, constrained by a CHECK in the schema
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <&str as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, Postgres> for Role {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<Postgres>>::decode(value)?;
        Ok(s.parse::<Role>()?)
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        <&str as sqlx::Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

pub const USER_SCHEMA: &[Column] = &[
    Column::new("id", ColumnKind::Uuid),
    Column::new("name", ColumnKind::Text),
    Column::new("email", ColumnKind::Text),
    Column::new("photo", ColumnKind::Text),
    Column::new("role", ColumnKind::Text),
    Column::hidden("password", ColumnKind::Text),
    Column::hidden("password_changed_at", ColumnKind::Timestamp),
    Column::hidden("password_reset_token", ColumnKind::Text),
    Column::hidden("password_reset_expires", ColumnKind::Timestamp),
    Column::hidden("active", ColumnKind::Boolean),
    Column::new("created_at", ColumnKind::Timestamp),
];

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("Please tell us your name!".into());
        return Err(err);
    }
    Ok(())
}

fn validate_passwords_match(data: &UserCreate) -> Result<(), ValidationError> {
    if data.password != data.password_confirm {
        let mut err = ValidationError::new("password_confirm");
        err.message = Some("Passwords are not the same!".into());
        return Err(err);
    }
    Ok(())
}

/// New account. `role` and `photo` are only honoured for admin-created users.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_passwords_match"))]
pub struct UserCreate {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub photo: Option<String>,
    pub role: Option<Role>,
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    pub photo: String,
    pub role: Role,
}

/// The fields users may change on their own account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(custom(function = "validate_name"))]
    pub name: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
}

/// New password together with its confirmation
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_password"))]
pub struct PasswordChange {
    #[validate(length(min = 8, message = "A password must have at least 8 characters"))]
    pub password: String,
    pub password_confirm: String,
}

fn validate_new_password(data: &PasswordChange) -> Result<(), ValidationError> {
    if data.password != data.password_confirm {
        let mut err = ValidationError::new("password_confirm");
        err.message = Some("Passwords are not the same!".into());
        return Err(err);
    }
    Ok(())
}

#[async_trait]
impl Model for User {
    const NAME: &'static str = "user";
    const TABLE: &'static str = "users";
    const SCHEMA: &'static [Column] = USER_SCHEMA;

    type Create = UserCreate;
    type Update = UserUpdate;

    fn id(&self) -> Uuid {
        self.id
    }

    fn scope() -> Option<Value> {
        Some(json!({ "active": true }))
    }

    fn to_update(&self) -> UserUpdate {
        UserUpdate {
            name: self.name.clone(),
            email: self.email.clone(),
            photo: self.photo.clone(),
            role: self.role,
        }
    }

    async fn insert(pool: &PgPool, data: UserCreate) -> Result<Self, DatabaseError> {
        let password = hash_password(&data.password).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, photo, role, password) \
             VALUES ($1, $2, COALESCE($3, 'default.jpg'), $4, $5) RETURNING *",
        )
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(data.photo)
        .bind(data.role.unwrap_or(Role::User))
        .bind(password)
        .fetch_one(pool)
        .await?;
        Ok(user)
    }

    async fn update(pool: &PgPool, id: Uuid, data: UserUpdate) -> Result<Self, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2, email = $3, photo = $4, role = $5 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(data.photo)
        .bind(data.role)
        .fetch_optional(pool)
        .await?;
        user.ok_or_else(|| DatabaseError::NotFound("No user found with that ID".to_string()))
    }

    /// Hard delete. The user's reviews cascade away, so the aggregates of
    /// the tours they reviewed are recomputed afterwards.
    async fn delete(pool: &PgPool, id: Uuid) -> Result<Self, DatabaseError> {
        let reviewed: Vec<Uuid> = sqlx::query_scalar("SELECT DISTINCT tour_id FROM reviews WHERE user_id = $1")
            .bind(id)
            .fetch_all(pool)
            .await?;

        let user = sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("No user found with that ID".to_string()))?;

        for tour_id in reviewed {
            ratings::recalculate(pool, tour_id).await?;
        }
        Ok(user)
    }
}

impl User {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Active user by email, password hash included
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, DatabaseError> {
        Repository::<User>::new(pool.clone())
            .select_one(json!({ "email": email.trim().to_lowercase() }))
            .await
    }

    /// Active user holding an unexpired reset token with this digest
    pub async fn find_by_reset_digest(pool: &PgPool, digest: &str) -> Result<Option<User>, DatabaseError> {
        Repository::<User>::new(pool.clone())
            .select_one(json!({
                "password_reset_token": digest,
                "password_reset_expires": { "$gt": Utc::now() },
            }))
            .await
    }

    /// Stores a new password hash, clears any reset token and stamps the
    /// change one second in the past so a token issued right after still
    /// verifies.
    pub async fn set_password(pool: &PgPool, id: Uuid, password: &str) -> Result<User, DatabaseError> {
        let hash = hash_password(password).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET password = $2, password_changed_at = $3, \
             password_reset_token = NULL, password_reset_expires = NULL \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(hash)
        .bind(Utc::now() - Duration::seconds(1))
        .fetch_optional(pool)
        .await?;
        user.ok_or_else(|| DatabaseError::NotFound("No user found with that ID".to_string()))
    }

    pub async fn set_reset_token(
        pool: &PgPool,
        id: Uuid,
        digest: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET password_reset_token = $2, password_reset_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(digest)
            .bind(expires_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_profile(pool: &PgPool, id: Uuid, profile: &ProfileUpdate) -> Result<User, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET name = $2, email = $3 WHERE id = $1 AND active RETURNING *",
        )
        .bind(id)
        .bind(profile.name.trim())
        .bind(profile.email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;
        user.ok_or_else(|| DatabaseError::NotFound("No user found with that ID".to_string()))
    }

    /// Inserts with a caller-chosen id, for seeding
    pub async fn import(conn: &mut PgConnection, id: Uuid, data: UserCreate) -> Result<User, DatabaseError> {
        let password = hash_password(&data.password).map_err(|e| DatabaseError::QueryError(e.to_string()))?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, email, photo, role, password) \
             VALUES ($1, $2, $3, COALESCE($4, 'default.jpg'), $5, $6) RETURNING *",
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(data.photo)
        .bind(data.role.unwrap_or(Role::User))
        .bind(password)
        .fetch_one(conn)
        .await?;
        Ok(user)
    }

    /// Soft delete: the account disappears from every scoped query
    pub async fn deactivate(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Active users by id, for populating references
    pub async fn lookup(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, User>, DatabaseError> {
        let users = Repository::<User>::new(pool.clone()).select_ids(ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    /// Author summary embedded in reviews and bookings
    pub fn summary(&self) -> Value {
        json!({ "id": self.id, "name": self.name, "photo": self.photo })
    }
}

//! PostgreSQL user store implementation

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use crate::domain::user::{PostId, UserId, UserRecord, UserRecordParts, UserStore};
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, birth_year, gender, place_state, place_city, is_admin,
           email, password, posts, version, created_at, updated_at
    FROM users
"#;

/// PostgreSQL implementation of UserStore
///
/// Email uniqueness is backed by the `users_email_key` unique index created
/// by the storage migrations.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get(&self, id: &UserId) -> Result<Option<UserRecord>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE email = $1", SELECT_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get user by email: {}", e)))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn insert(&self, record: &UserRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, birth_year, gender, place_state, place_city,
                               is_admin, email, password, posts, version,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.name())
        .bind(record.birth_year())
        .bind(record.gender())
        .bind(record.place_state())
        .bind(record.place_city())
        .bind(record.is_admin())
        .bind(record.email())
        .bind(record.password())
        .bind(posts_to_uuids(record.posts()))
        .bind(version_to_db(record.version())?)
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, record, "create"))?;

        Ok(())
    }

    async fn update(&self, record: &UserRecord, expected_version: u32) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, birth_year = $3, gender = $4, place_state = $5,
                place_city = $6, is_admin = $7, email = $8, password = $9,
                posts = $10, version = $11, updated_at = $12
            WHERE id = $1 AND version = $13
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.name())
        .bind(record.birth_year())
        .bind(record.gender())
        .bind(record.place_state())
        .bind(record.place_city())
        .bind(record.is_admin())
        .bind(record.email())
        .bind(record.password())
        .bind(posts_to_uuids(record.posts()))
        .bind(version_to_db(record.version())?)
        .bind(record.updated_at())
        .bind(version_to_db(expected_version)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, record, "update"))?;

        if result.rows_affected() == 0 {
            if self.exists(record.id()).await? {
                return Err(DomainError::conflict(format!(
                    "User '{}' was modified concurrently",
                    record.id()
                )));
            }

            return Err(DomainError::not_found(format!(
                "User '{}' not found",
                record.id()
            )));
        }

        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete user: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, DomainError> {
        let rows = sqlx::query(&format!("{} ORDER BY created_at", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list users: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn count_by_email(&self, email: &str) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count users: {}", e)))?;

        usize::try_from(count)
            .map_err(|_| DomainError::storage(format!("Invalid user count: {}", count)))
    }

    async fn exists(&self, id: &UserId) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check existence: {}", e)))
    }
}

fn map_write_error(e: sqlx::Error, record: &UserRecord, action: &str) -> DomainError {
    let unique_violation = e
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);

    if unique_violation {
        DomainError::conflict(format!("Email '{}' already exists", record.email()))
    } else {
        error!(error = %e, user_id = %record.id(), "failed to {} user", action);
        DomainError::storage(format!("Failed to {} user: {}", action, e))
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<UserRecord, DomainError> {
    let column_error =
        |e: sqlx::Error| DomainError::storage(format!("Invalid user row in database: {}", e));

    let id: Uuid = row.try_get("id").map_err(column_error)?;
    let posts: Vec<Uuid> = row.try_get("posts").map_err(column_error)?;
    let version: i32 = row.try_get("version").map_err(column_error)?;

    Ok(UserRecord::from_parts(UserRecordParts {
        id: UserId::from_uuid(id),
        name: row.try_get("name").map_err(column_error)?,
        birth_year: row.try_get("birth_year").map_err(column_error)?,
        gender: row.try_get("gender").map_err(column_error)?,
        place_state: row.try_get("place_state").map_err(column_error)?,
        place_city: row.try_get("place_city").map_err(column_error)?,
        is_admin: row.try_get("is_admin").map_err(column_error)?,
        email: row.try_get("email").map_err(column_error)?,
        password: row.try_get("password").map_err(column_error)?,
        posts: posts.into_iter().map(PostId::from_uuid).collect(),
        version: version_from_db(version)?,
        created_at: row.try_get("created_at").map_err(column_error)?,
        updated_at: row.try_get("updated_at").map_err(column_error)?,
    }))
}

fn posts_to_uuids(posts: &[PostId]) -> Vec<Uuid> {
    posts.iter().map(PostId::as_uuid).collect()
}

fn version_to_db(version: u32) -> Result<i32, DomainError> {
    i32::try_from(version)
        .map_err(|_| DomainError::storage(format!("Version {} exceeds column range", version)))
}

fn version_from_db(version: i32) -> Result<u32, DomainError> {
    u32::try_from(version)
        .map_err(|_| DomainError::storage(format!("Invalid version in database: {}", version)))
}

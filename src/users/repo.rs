use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use super::repo_types::{NewUser, ProfileChanges, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    Conflict { constraint: String },
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Conflict {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        StoreError::Database(e)
    }
}

/// Persistence for the `users` table.
///
/// Writes report whether a row matched, so a user removed between a
/// lookup and the write shows up as `false` instead of a silent no-op.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn find(&self, user_id: i64) -> Result<Option<User>, StoreError>;
    async fn username_taken(&self, username: &str) -> Result<bool, StoreError>;
    /// Fails with `Conflict` when the username already exists.
    async fn insert(&self, user: &NewUser) -> Result<i64, StoreError>;
    async fn update_profile(&self, user_id: i64, changes: &ProfileChanges)
        -> Result<bool, StoreError>;
    async fn set_profile_image(
        &self,
        user_id: i64,
        file_name: Option<&str>,
    ) -> Result<bool, StoreError>;
    async fn set_password_hash(&self, user_id: i64, hash: &str) -> Result<bool, StoreError>;
    /// Hard delete, returning the removed row.
    async fn delete(&self, user_id: i64) -> Result<Option<User>, StoreError>;
}

const USER_COLUMNS: &str =
    "user_id, username, password_hash, name, email, phone, profile_image, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY user_id",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn username_taken(&self, username: &str) -> Result<bool, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)"#,
        )
        .bind(username)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    async fn insert(&self, user: &NewUser) -> Result<i64, StoreError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, password_hash, name, email, phone, profile_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING user_id
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.profile_image.as_deref())
        .fetch_one(&self.db)
        .await?;
        Ok(user_id)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        changes: &ProfileChanges,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   phone = COALESCE($4, phone),
                   updated_at = now()
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.phone.as_deref())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_profile_image(
        &self,
        user_id: i64,
        file_name: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE users SET profile_image = $2, updated_at = now() WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(file_name)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, user_id: i64, hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE users SET password_hash = $2, updated_at = now() WHERE user_id = $1"#,
        )
        .bind(user_id)
        .bind(hash)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE user_id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

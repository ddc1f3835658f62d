use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Row of the `users` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_image: Option<String>, // filename only, never a URL
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_image: Option<String>,
}

/// `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

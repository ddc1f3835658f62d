use serde::Serialize;
use time::OffsetDateTime;

use crate::images::UploadItem;

/// Body of `POST /users`; the image only arrives via multipart.
#[derive(Debug, Default)]
pub struct CreateUserForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_image: Option<UploadItem>,
}

/// Body of `POST /users/profile-image`.
#[derive(Debug, Default)]
pub struct ProfileImageForm {
    pub username: Option<String>,
    pub profile_image: Option<UploadItem>,
}

#[derive(Debug, Default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Default)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub user_id: i64,
}

/// A user as returned to clients, with `profile_image` as a full URL.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profile_image: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

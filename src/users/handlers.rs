use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post, put},
    Router,
};
use tracing::instrument;

use super::dto::{
    ChangePasswordRequest, CreateUserForm, CreatedUserResponse, ProfileImageForm,
    UpdateUserRequest, UserResponse,
};
use super::extractors::{RequestFields, UserPath};
use super::services;
use crate::{auth::SessionUser, envelope::Envelope, error::ApiError, state::AppState};

pub(crate) const UPLOAD_BODY_LIMIT: usize = 10 * 1024 * 1024;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(show_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route(
            "/users/:id",
            put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
        .route("/users/profile-image", post(change_profile_image))
        .route("/users/password", post(change_password))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Envelope<Vec<UserResponse>>, ApiError> {
    let users = services::list_users(&state).await?;
    Ok(Envelope::ok(users))
}

#[instrument(skip(state))]
pub async fn show_user(
    State(state): State<AppState>,
    UserPath(id): UserPath,
) -> Result<Envelope<UserResponse>, ApiError> {
    let user = services::get_user(&state, id).await?;
    Ok(Envelope::ok(user))
}

/// POST /users (username, password, name, email, phone, profile_image?)
#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    mut body: RequestFields,
) -> Result<Envelope<CreatedUserResponse>, ApiError> {
    let form = CreateUserForm {
        username: body.take("username"),
        password: body.take("password"),
        name: body.take("name"),
        email: body.take("email"),
        phone: body.take("phone"),
        profile_image: body.profile_image,
    };
    let user_id = services::create_user(&state, form).await?;
    Ok(Envelope::created(CreatedUserResponse { user_id }))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    session: SessionUser,
    UserPath(id): UserPath,
    mut body: RequestFields,
) -> Result<Envelope<()>, ApiError> {
    let req = UpdateUserRequest {
        name: body.take("name"),
        email: body.take("email"),
        phone: body.take("phone"),
    };
    services::update_user(&state, session, Some(id), req).await?;
    Ok(Envelope::message("User updated successfully"))
}

/// POST /users/profile-image (username?, profile_image?)
#[instrument(skip(state, body))]
pub async fn change_profile_image(
    State(state): State<AppState>,
    session: SessionUser,
    mut body: RequestFields,
) -> Result<Envelope<()>, ApiError> {
    let form = ProfileImageForm {
        username: body.take("username"),
        profile_image: body.profile_image,
    };
    services::change_profile_image(&state, session, form).await?;
    Ok(Envelope::message("Profile image updated successfully"))
}

#[instrument(skip(state, body))]
pub async fn change_password(
    State(state): State<AppState>,
    session: SessionUser,
    mut body: RequestFields,
) -> Result<Envelope<()>, ApiError> {
    let req = ChangePasswordRequest {
        old_password: body.take("old_password"),
        new_password: body.take("new_password"),
    };
    services::change_password(&state, session, req).await?;
    Ok(Envelope::message("Password updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    session: SessionUser,
    UserPath(id): UserPath,
) -> Result<Envelope<()>, ApiError> {
    services::delete_user(&state, session, Some(id)).await?;
    Ok(Envelope::message("User successfully deleted"))
}

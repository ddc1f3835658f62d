use tracing::{info, warn};

use super::dto::{
    ChangePasswordRequest, CreateUserForm, ProfileImageForm, UpdateUserRequest, UserResponse,
};
use super::repo::StoreError;
use super::repo_types::{NewUser, ProfileChanges, User};
use crate::{
    auth::{
        password::{hash_password, verify_password},
        SessionUser,
    },
    error::ApiError,
    images::{
        delete_profile_image, profile_image_url, store_profile_image, PROFILE_IMAGE_MAX_KB,
        PROFILE_IMAGE_TYPES,
    },
    state::AppState,
    validation::{FileRule, Rule, ValidationErrors, Validator},
};

const USER_NOT_FOUND: &str = "User not found";

const PROFILE_IMAGE_RULES: [FileRule; 3] = [
    FileRule::MimeIn(PROFILE_IMAGE_TYPES),
    FileRule::IsImage,
    FileRule::MaxSizeKb(PROFILE_IMAGE_MAX_KB),
];

fn to_response(st: &AppState, user: User) -> UserResponse {
    let profile_image = user
        .profile_image
        .filter(|f| !f.is_empty())
        .map(|f| profile_image_url(st, &f));
    UserResponse {
        user_id: user.user_id,
        username: user.username,
        name: user.name,
        email: user.email,
        phone: user.phone,
        profile_image,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

/// Blank form values count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The account a mutating request acts on. A path id, when given, has to
/// name the session user.
fn acting_user(session: SessionUser, path_id: Option<i64>) -> Result<i64, ApiError> {
    let SessionUser(Some(user_id)) = session else {
        warn!("no session user");
        return Err(ApiError::NotFound(USER_NOT_FOUND));
    };
    if let Some(path_id) = path_id.filter(|id| *id != user_id) {
        warn!(user_id, path_id, "attempt to modify another account");
        return Err(ApiError::Forbidden("Cannot modify another user's account"));
    }
    Ok(user_id)
}

async fn load_acting_user(
    st: &AppState,
    user_id: i64,
    failure: &'static str,
) -> Result<User, ApiError> {
    match st.users.find(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(user_id, "session user not found");
            Err(ApiError::NotFound(USER_NOT_FOUND))
        }
        Err(e) => Err(ApiError::server(failure)(e)),
    }
}

pub async fn list_users(st: &AppState) -> Result<Vec<UserResponse>, ApiError> {
    let users = st
        .users
        .list()
        .await
        .map_err(ApiError::server("Failed to fetch users"))?;
    if users.is_empty() {
        return Err(ApiError::NotFound("Users not found"));
    }
    Ok(users.into_iter().map(|u| to_response(st, u)).collect())
}

pub async fn get_user(st: &AppState, user_id: i64) -> Result<UserResponse, ApiError> {
    let user = st
        .users
        .find(user_id)
        .await
        .map_err(ApiError::server("Failed to fetch user"))?
        .ok_or(ApiError::NotFound(USER_NOT_FOUND))?;
    Ok(to_response(st, user))
}

pub async fn create_user(st: &AppState, form: CreateUserForm) -> Result<i64, ApiError> {
    const FAILURE: &str = "Failed to create user";

    let username = present(form.username).map(|u| u.trim().to_string());
    let taken = match &username {
        Some(u) => st.users.username_taken(u).await.map_err(ApiError::server(FAILURE))?,
        None => false,
    };

    Validator::new()
        .field(
            "username",
            username.as_deref(),
            &[Rule::Required, Rule::Unique { taken }, Rule::MinLength(4)],
        )
        .field("password", form.password.as_deref(), &[Rule::Required, Rule::MinLength(6)])
        .field("name", form.name.as_deref(), &[Rule::Required])
        .field("email", form.email.as_deref(), &[Rule::Required, Rule::ValidEmail])
        .field("phone", form.phone.as_deref(), &[Rule::Required])
        .file("profile_image", form.profile_image.as_ref(), &PROFILE_IMAGE_RULES)
        .finish()
        .inspect_err(|errors| warn!(%errors, "create user rejected"))?;

    // Validation guarantees every required field is present.
    let (Some(username), Some(password), Some(name), Some(email), Some(phone)) =
        (username, form.password, form.name, form.email, form.phone)
    else {
        return Err(ApiError::bad_request("missing required fields"));
    };

    let password_hash = hash_password(&password).map_err(ApiError::server(FAILURE))?;

    let profile_image = match &form.profile_image {
        Some(upload) => store_profile_image(st, upload, &username)
            .await
            .map_err(ApiError::server(FAILURE))?,
        None => None,
    };

    let new_user = NewUser {
        username,
        password_hash,
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        phone: phone.trim().to_string(),
        profile_image,
    };

    match st.users.insert(&new_user).await {
        Ok(user_id) => {
            info!(user_id, username = %new_user.username, "user created");
            Ok(user_id)
        }
        Err(e) => {
            delete_profile_image(st, new_user.profile_image.as_deref()).await;
            match e {
                StoreError::Conflict { .. } => {
                    warn!(username = %new_user.username, "username taken at insert");
                    Err(ValidationErrors::single(
                        "username",
                        "The username field must contain a unique value.",
                    )
                    .into())
                }
                other => Err(ApiError::server(FAILURE)(other)),
            }
        }
    }
}

pub async fn update_user(
    st: &AppState,
    session: SessionUser,
    path_id: Option<i64>,
    req: UpdateUserRequest,
) -> Result<(), ApiError> {
    const FAILURE: &str = "Failed to update user";

    let changes = ProfileChanges {
        name: present(req.name).map(|v| v.trim().to_string()),
        email: present(req.email).map(|v| v.trim().to_string()),
        phone: present(req.phone).map(|v| v.trim().to_string()),
    };

    Validator::new()
        .field("email", changes.email.as_deref(), &[Rule::ValidEmail])
        .finish()
        .inspect_err(|errors| warn!(%errors, "update user rejected"))?;

    let user_id = acting_user(session, path_id)?;

    match st.users.update_profile(user_id, &changes).await {
        Ok(true) => {
            info!(user_id, "user updated");
            Ok(())
        }
        Ok(false) => {
            warn!(user_id, "session user not found");
            Err(ApiError::NotFound(USER_NOT_FOUND))
        }
        Err(e) => Err(ApiError::server(FAILURE)(e)),
    }
}

/// Replaces or clears the stored profile image. Without an accepted upload
/// the reference is cleared; the previous file is removed either way.
pub async fn change_profile_image(
    st: &AppState,
    session: SessionUser,
    form: ProfileImageForm,
) -> Result<(), ApiError> {
    const FAILURE: &str = "Failed to update profile image";

    Validator::new()
        .file("profile_image", form.profile_image.as_ref(), &PROFILE_IMAGE_RULES)
        .finish()
        .inspect_err(|errors| warn!(%errors, "profile image rejected"))?;

    let user_id = acting_user(session, None)?;
    let existing = load_acting_user(st, user_id, FAILURE).await?;

    let username = present(form.username).unwrap_or_else(|| existing.username.clone());
    let file_name = match &form.profile_image {
        Some(upload) => store_profile_image(st, upload, &username)
            .await
            .map_err(ApiError::server(FAILURE))?,
        None => None,
    };

    let saved = st.users.set_profile_image(user_id, file_name.as_deref()).await;
    match saved {
        Ok(true) => {}
        Ok(false) => {
            delete_profile_image(st, file_name.as_deref()).await;
            return Err(ApiError::NotFound(USER_NOT_FOUND));
        }
        Err(e) => {
            delete_profile_image(st, file_name.as_deref()).await;
            return Err(ApiError::server(FAILURE)(e));
        }
    }

    delete_profile_image(st, existing.profile_image.as_deref()).await;
    info!(user_id, file_name = ?file_name, "profile image changed");
    Ok(())
}

pub async fn change_password(
    st: &AppState,
    session: SessionUser,
    req: ChangePasswordRequest,
) -> Result<(), ApiError> {
    const FAILURE: &str = "Failed to change password";

    Validator::new()
        .field("old_password", req.old_password.as_deref(), &[Rule::Required, Rule::MinLength(6)])
        .field("new_password", req.new_password.as_deref(), &[Rule::Required, Rule::MinLength(6)])
        .finish()
        .inspect_err(|errors| warn!(%errors, "change password rejected"))?;

    let (Some(old_password), Some(new_password)) = (req.old_password, req.new_password) else {
        return Err(ApiError::bad_request("missing required fields"));
    };

    let user_id = acting_user(session, None)?;
    let existing = load_acting_user(st, user_id, FAILURE).await?;

    let matches = verify_password(&old_password, &existing.password_hash)
        .map_err(ApiError::server(FAILURE))?;
    if !matches {
        warn!(user_id, "old password does not match");
        return Err(ApiError::AuthenticationMismatch("Old password does not match"));
    }

    let hash = hash_password(&new_password).map_err(ApiError::server(FAILURE))?;
    match st.users.set_password_hash(user_id, &hash).await {
        Ok(true) => {
            info!(user_id, "password changed");
            Ok(())
        }
        Ok(false) => Err(ApiError::NotFound(USER_NOT_FOUND)),
        Err(e) => Err(ApiError::server(FAILURE)(e)),
    }
}

pub async fn delete_user(
    st: &AppState,
    session: SessionUser,
    path_id: Option<i64>,
) -> Result<(), ApiError> {
    let user_id = acting_user(session, path_id)?;

    let deleted = st
        .users
        .delete(user_id)
        .await
        .map_err(ApiError::server("Failed to delete user"))?
        .ok_or_else(|| {
            warn!(user_id, "session user not found");
            ApiError::NotFound(USER_NOT_FOUND)
        })?;

    delete_profile_image(st, deleted.profile_image.as_deref()).await;
    info!(user_id, "user deleted");
    Ok(())
}

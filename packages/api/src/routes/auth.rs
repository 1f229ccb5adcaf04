//! Account registration, login and profile management
//!
//! Login places a signed session token in an HttpOnly cookie; everything
//! administrative sits behind [`AuthSession::require`].

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::{
        StatusCode,
        header::{self, HeaderName},
    },
    routing::{delete, get, post, put},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::{Deserialize, Serialize};

use crate::entity::user;
use crate::error::ApiError;
use crate::middleware::session::{
    AuthSession, clear_session_cookie, issue_session_token, session_cookie,
};
use crate::routes::is_image_data_url;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/status", get(status))
        .route("/change-password", post(change_password))
        .route("/update-profile", put(update_profile))
        .route("/delete-account", delete(delete_account))
}

pub(crate) fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

type SetCookie = [(HeaderName, String); 1];

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[tracing::instrument(name = "POST /auth/register", skip(state, req))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<user::Model>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username is required"));
    }
    if req.password.chars().count() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {}", err)))?;

    let created = user::ActiveModel {
        username: Set(username),
        password_hash: Set(password_hash),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|err| match err.sql_err() {
        // Lost a race with a concurrent registration of the same name.
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ApiError::conflict("Username is already taken")
        }
        _ => ApiError::from(err),
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[tracing::instrument(name = "POST /auth/login", skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(SetCookie, Json<user::Model>), ApiError> {
    let user = user::Entity::find()
        .filter(user::Column::Username.eq(req.username.trim()))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_session_token(&state.session_secret, user.id)
        .map_err(|err| ApiError::internal(format!("Failed to issue session token: {}", err)))?;

    Ok(([(header::SET_COOKIE, session_cookie(&token))], Json(user)))
}

#[tracing::instrument(name = "POST /auth/logout")]
pub async fn logout() -> (SetCookie, Json<MessageResponse>) {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<user::Model>,
}

#[tracing::instrument(name = "GET /auth/status", skip(state, session))]
pub async fn status(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Some(user_id) = session.user_id() else {
        return Ok(Json(StatusResponse {
            is_logged_in: false,
            user: None,
        }));
    };

    // A valid token for a deleted account counts as logged out.
    let user = user::Entity::find_by_id(user_id).one(&state.db).await?;
    Ok(Json(StatusResponse {
        is_logged_in: user.is_some(),
        user,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[tracing::instrument(name = "POST /auth/change-password", skip(state, session, req))]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = session.require()?;

    if req.new_password.chars().count() < 6 {
        return Err(ApiError::bad_request(
            "New password must be at least 6 characters",
        ));
    }

    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let password_hash = hash_password(&req.new_password)
        .map_err(|err| ApiError::internal(format!("Failed to hash password: {}", err)))?;

    let mut active: user::ActiveModel = user.into();
    active.password_hash = Set(password_hash);
    active.update(&state.db).await?;

    Ok(Json(MessageResponse {
        message: "Password changed".to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_pic: Option<String>,
}

#[tracing::instrument(name = "PUT /auth/update-profile", skip(state, session, req))]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<user::Model>, ApiError> {
    let user_id = session.require()?;

    if req.full_name.is_none()
        && req.email.is_none()
        && req.phone.is_none()
        && req.profile_pic.is_none()
    {
        return Err(ApiError::bad_request("No profile fields to update"));
    }

    let user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut active: user::ActiveModel = user.into();

    if let Some(full_name) = req.full_name {
        let trimmed = full_name.trim().to_string();
        if trimmed.chars().count() < 3 {
            return Err(ApiError::bad_request(
                "Full name must be at least 3 characters",
            ));
        }
        active.full_name = Set(Some(trimmed));
    }
    if let Some(email) = req.email {
        if !email.contains('@') {
            return Err(ApiError::bad_request("Invalid email address"));
        }
        active.email = Set(Some(email));
    }
    if let Some(phone) = req.phone {
        if !is_valid_phone(&phone) {
            return Err(ApiError::bad_request("Invalid phone number"));
        }
        active.phone = Set(Some(phone));
    }
    if let Some(profile_pic) = req.profile_pic {
        if !is_image_data_url(&profile_pic) {
            return Err(ApiError::bad_request(
                "Profile picture must be an inline image data URL",
            ));
        }
        active.profile_pic = Set(Some(profile_pic));
    }

    let updated = active.update(&state.db).await?;
    Ok(Json(updated))
}

#[tracing::instrument(name = "DELETE /auth/delete-account", skip(state, session))]
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<(SetCookie, Json<MessageResponse>), ApiError> {
    let user_id = session.require()?;

    let result = user::Entity::delete_by_id(user_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse {
            message: "Account deleted".to_string(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::session::verify_session_token;
    use crate::test_util::test_state;
    use axum::http::StatusCode;

    fn register_req(username: &str, password: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    #[tokio::test]
    async fn register_login_status_roundtrip() {
        let state = test_state().await;

        let (status_code, Json(created)) =
            register(State(state.clone()), register_req("ana", "hunter22"))
                .await
                .unwrap();
        assert_eq!(status_code, StatusCode::CREATED);
        assert_eq!(created.username, "ana");

        let (cookie, Json(user)) = login(
            State(state.clone()),
            Json(LoginRequest {
                username: "ana".to_string(),
                password: "hunter22".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(user.id, created.id);

        // The cookie carries a token for the logged-in user.
        let value = &cookie[0].1;
        let token = value
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, tok)| tok)
            .unwrap();
        assert_eq!(
            verify_session_token(&state.session_secret, token).unwrap(),
            user.id
        );

        let session = AuthSession::User { user_id: user.id };
        let Json(status) = status(State(state.clone()), Extension(session))
            .await
            .unwrap();
        assert!(status.is_logged_in);
        assert_eq!(status.user.unwrap().username, "ana");
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let state = test_state().await;
        register(State(state.clone()), register_req("ana", "hunter22"))
            .await
            .unwrap();

        let err = register(State(state.clone()), register_req("ana", "hunter23"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let state = test_state().await;
        let err = register(State(state), register_req("ana", "12345"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let state = test_state().await;
        register(State(state.clone()), register_req("ana", "hunter22"))
            .await
            .unwrap();

        let err = login(
            State(state),
            Json(LoginRequest {
                username: "ana".to_string(),
                password: "wrong-password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn change_password_requires_the_current_one() {
        let state = test_state().await;
        let (_, Json(user)) = register(State(state.clone()), register_req("ana", "hunter22"))
            .await
            .unwrap();
        let session = AuthSession::User { user_id: user.id };

        let err = change_password(
            State(state.clone()),
            Extension(session.clone()),
            Json(ChangePasswordRequest {
                current_password: "wrong".to_string(),
                new_password: "hunter23".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        change_password(
            State(state.clone()),
            Extension(session),
            Json(ChangePasswordRequest {
                current_password: "hunter22".to_string(),
                new_password: "hunter23".to_string(),
            }),
        )
        .await
        .unwrap();

        // Old password no longer works, the new one does.
        assert!(
            login(
                State(state.clone()),
                Json(LoginRequest {
                    username: "ana".to_string(),
                    password: "hunter22".to_string(),
                }),
            )
            .await
            .is_err()
        );
        login(
            State(state),
            Json(LoginRequest {
                username: "ana".to_string(),
                password: "hunter23".to_string(),
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn profile_updates_are_validated_and_partial() {
        let state = test_state().await;
        let (_, Json(user)) = register(State(state.clone()), register_req("ana", "hunter22"))
            .await
            .unwrap();
        let session = AuthSession::User { user_id: user.id };

        let err = update_profile(
            State(state.clone()),
            Extension(session.clone()),
            Json(UpdateProfileRequest {
                phone: Some("not-a-phone".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");

        let Json(updated) = update_profile(
            State(state.clone()),
            Extension(session),
            Json(UpdateProfileRequest {
                full_name: Some("Ana Souza".to_string()),
                phone: Some("+5511999990000".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Ana Souza"));
        assert_eq!(updated.phone.as_deref(), Some("+5511999990000"));
        // Untouched fields stay untouched.
        assert_eq!(updated.email, None);
    }

    #[tokio::test]
    async fn deleted_account_reads_as_logged_out() {
        let state = test_state().await;
        let (_, Json(user)) = register(State(state.clone()), register_req("ana", "hunter22"))
            .await
            .unwrap();
        let session = AuthSession::User { user_id: user.id };

        delete_account(State(state.clone()), Extension(session.clone()))
            .await
            .unwrap();

        // Stale session token for the removed account.
        let Json(status) = status(State(state), Extension(session)).await.unwrap();
        assert!(!status.is_logged_in);
    }

    #[test]
    fn phone_validation() {
        assert!(is_valid_phone("+5511999990000"));
        assert!(is_valid_phone("1234567890"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("+55 11 99999"));
        assert!(!is_valid_phone("abcdefghij"));
    }
}

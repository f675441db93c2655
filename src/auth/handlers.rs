use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MessageResponse, PasswordResetConfirmRequest,
            PasswordResetRequest, PublicUser, RegisterRequest, VerifyResponse,
        },
        extractors::{ClientMeta, CurrentUser},
        repo::session_tokens,
        services,
    },
    error::ApiResult,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .route("/auth/logout/", post(logout))
        .route("/auth/verify/", get(verify))
        .route("/auth/password-reset/", post(password_reset_request))
        .route("/auth/password-reset/confirm/", post(password_reset_confirm))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = services::register(&state, payload, &meta).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".into(),
            user: PublicUser::from(&user),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (user, token) =
        services::authenticate(&state, &payload.username, &payload.password, &meta).await?;
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        user: PublicUser::from(&user),
        token,
    }))
}

#[instrument(skip(state, user))]
async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MessageResponse>> {
    session_tokens::revoke(&state.db, user.id).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

#[instrument(skip(user))]
async fn verify(CurrentUser(user): CurrentUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        message: "Token is valid".into(),
        user: PublicUser::from(&user),
    })
}

#[instrument(skip(state, payload))]
async fn password_reset_request(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::request_password_reset(&state, &payload.email).await?;
    // The same answer whether or not an account exists behind the address.
    Ok(Json(MessageResponse::new(
        "If an account exists for this address, a password reset email has been sent",
    )))
}

#[instrument(skip(state, payload))]
async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::confirm_password_reset(&state, &payload).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

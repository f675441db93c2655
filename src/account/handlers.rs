use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    account::{
        dto::{
            PasswordChangeRequest, ProfileResponse, ProfileUpdateRequest, ProfileUpdateResponse,
            ProfileView, UserListItem, UsersResponse,
        },
        repo::UserProfile,
        services,
    },
    auth::{
        dto::MessageResponse,
        extractors::{CurrentUser, StaffUser},
        repo::User,
    },
    error::ApiResult,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/profile/", get(get_profile).put(update_profile))
        .route("/user/change-password/", post(change_password))
        .route("/users/", get(list_users))
}

#[instrument(skip(state, user))]
async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = UserProfile::get_or_create(&state.db, user.id).await?;
    Ok(Json(ProfileResponse {
        profile: ProfileView::new(&user, &profile),
    }))
}

#[instrument(skip(state, user, payload))]
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> ApiResult<Json<ProfileUpdateResponse>> {
    let (user, profile) = services::update_profile(&state, &user, payload).await?;
    Ok(Json(ProfileUpdateResponse {
        message: "Profile updated successfully".into(),
        profile: ProfileView::new(&user, &profile),
    }))
}

#[instrument(skip(state, user, payload))]
async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PasswordChangeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    services::change_password(&state, &user, &payload).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[instrument(skip(state, _staff))]
async fn list_users(
    State(state): State<AppState>,
    StaffUser(_staff): StaffUser,
) -> ApiResult<Json<UsersResponse>> {
    let users = User::list_active(&state.db).await?;
    Ok(Json(UsersResponse {
        users: users.iter().map(UserListItem::from).collect(),
    }))
}

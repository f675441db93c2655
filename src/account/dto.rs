use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::account::repo::UserProfile;
use crate::auth::repo::User;

/// Joined user + profile view returned by the profile endpoints.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub bio: String,
    pub phone_number: String,
    pub company: String,
    pub job_title: String,
    pub website: String,
    pub preferred_language: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub profile_visibility: String,
}

impl ProfileView {
    pub fn new(user: &User, profile: &UserProfile) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name(),
            bio: user.bio.clone(),
            phone_number: user.phone_number.clone(),
            company: profile.company.clone(),
            job_title: profile.job_title.clone(),
            website: profile.website.clone(),
            preferred_language: profile.preferred_language.clone(),
            timezone: profile.timezone.clone(),
            email_notifications: profile.email_notifications,
            push_notifications: profile.push_notifications,
            profile_visibility: profile.profile_visibility.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub message: String,
    pub profile: ProfileView,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdateRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub website: Option<String>,
    pub preferred_language: Option<String>,
    pub timezone: Option<String>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub profile_visibility: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserListItem {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<UserListItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
            phone_number: "+4915112345678".into(),
            bio: "annotator".into(),
            is_active: true,
            is_staff: false,
            is_verified: false,
            email_verified_at: None,
            failed_login_attempts: 0,
            account_locked_until: None,
            last_login: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn sample_profile(user_id: Uuid) -> UserProfile {
        UserProfile {
            user_id,
            company: "Sernion".into(),
            job_title: "Labeler".into(),
            website: String::new(),
            preferred_language: "en".into(),
            timezone: "UTC".into(),
            email_notifications: true,
            push_notifications: true,
            profile_visibility: "public".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn profile_view_joins_user_and_profile_fields() {
        let user = sample_user();
        let view = ProfileView::new(&user, &sample_profile(user.id));
        assert_eq!(view.full_name, "Alice Liddell");
        assert_eq!(view.company, "Sernion");
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"profile_visibility\":\"public\""));
        assert!(!json.contains("hash"));
    }

    #[test]
    fn user_list_item_carries_no_credentials() {
        let user = sample_user();
        let json = serde_json::to_string(&UserListItem::from(&user)).unwrap();
        assert!(json.contains("\"username\":\"alice\""));
        assert!(!json.contains("password"));
    }
}

use tracing::info;

use crate::{
    account::{
        dto::{PasswordChangeRequest, ProfileUpdateRequest},
        repo::{self, ProfileChanges, UserChanges, UserProfile},
    },
    auth::{
        password::{hash_password, validate_strength, verify_password},
        repo::User,
        services::{is_valid_email, is_valid_phone},
    },
    error::{ApiError, ApiResult, FieldErrors},
    state::AppState,
};

const VISIBILITY_CHOICES: [&str; 3] = ["public", "private", "friends"];

fn profile_field_errors(req: &ProfileUpdateRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(email) = req.email.as_deref() {
        if !is_valid_email(email) {
            errors.insert("email".into(), "Enter a valid email address.".into());
        }
    }
    if let Some(phone) = req.phone_number.as_deref() {
        if !phone.is_empty() && !is_valid_phone(phone) {
            errors.insert(
                "phone_number".into(),
                "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed."
                    .into(),
            );
        }
    }
    if let Some(visibility) = req.profile_visibility.as_deref() {
        if !VISIBILITY_CHOICES.contains(&visibility) {
            errors.insert(
                "profile_visibility".into(),
                "Visibility must be one of: public, private, friends.".into(),
            );
        }
    }
    errors
}

/// Applies user-row and profile-row changes from one request. Both
/// updates are partial; only the fields present in the payload move.
pub async fn update_profile(
    state: &AppState,
    user: &User,
    mut req: ProfileUpdateRequest,
) -> ApiResult<(User, UserProfile)> {
    if let Some(email) = req.email.as_mut() {
        *email = email.trim().to_lowercase();
    }

    let mut errors = profile_field_errors(&req);
    if let Some(email) = req.email.as_deref() {
        if !errors.contains_key("email")
            && User::email_taken_by_other(&state.db, user.id, email).await?
        {
            errors.insert("email".into(), "Email already exists.".into());
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let updated_user = repo::update_user(
        &state.db,
        user.id,
        &UserChanges {
            first_name: req.first_name.as_deref(),
            last_name: req.last_name.as_deref(),
            email: req.email.as_deref(),
            phone_number: req.phone_number.as_deref(),
            bio: req.bio.as_deref(),
        },
    )
    .await?;

    UserProfile::get_or_create(&state.db, user.id).await?;
    let profile = UserProfile::update(
        &state.db,
        user.id,
        &ProfileChanges {
            company: req.company.as_deref(),
            job_title: req.job_title.as_deref(),
            website: req.website.as_deref(),
            preferred_language: req.preferred_language.as_deref(),
            timezone: req.timezone.as_deref(),
            email_notifications: req.email_notifications,
            push_notifications: req.push_notifications,
            profile_visibility: req.profile_visibility.as_deref(),
        },
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok((updated_user, profile))
}

/// Requires the current password; the session token stays valid after
/// the change.
pub async fn change_password(
    state: &AppState,
    user: &User,
    req: &PasswordChangeRequest,
) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    if !verify_password(&req.current_password, &user.password_hash)? {
        errors.insert(
            "current_password".into(),
            "Current password is incorrect.".into(),
        );
    }
    if req.new_password != req.new_password_confirm {
        errors.insert(
            "new_password_confirm".into(),
            "New passwords don't match.".into(),
        );
    } else if let Err(msg) = validate_strength(&req.new_password, &user.username, &user.email) {
        errors.insert("new_password".into(), msg);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let password_hash = hash_password(&req.new_password)?;
    User::set_password(&state.db, user.id, &password_hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_has_no_field_errors() {
        assert!(profile_field_errors(&ProfileUpdateRequest::default()).is_empty());
    }

    #[test]
    fn bad_email_is_reported() {
        let req = ProfileUpdateRequest {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(profile_field_errors(&req).contains_key("email"));
    }

    #[test]
    fn unknown_visibility_is_rejected() {
        let req = ProfileUpdateRequest {
            profile_visibility: Some("everyone".into()),
            ..Default::default()
        };
        assert!(profile_field_errors(&req).contains_key("profile_visibility"));
    }

    #[test]
    fn known_visibility_passes() {
        for choice in VISIBILITY_CHOICES {
            let req = ProfileUpdateRequest {
                profile_visibility: Some(choice.into()),
                ..Default::default()
            };
            assert!(profile_field_errors(&req).is_empty());
        }
    }

    #[test]
    fn empty_phone_clears_without_error() {
        let req = ProfileUpdateRequest {
            phone_number: Some(String::new()),
            ..Default::default()
        };
        assert!(profile_field_errors(&req).is_empty());
    }
}

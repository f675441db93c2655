use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::{
    account::repo::UserProfile,
    auth::{
        dto::{PasswordResetConfirmRequest, RegisterRequest},
        extractors::ClientMeta,
        guard::LockoutPolicy,
        password::{hash_password, validate_strength, verify_password},
        repo::{self, login_history, reset_tokens, session_tokens, NewUser, User},
        tokens::{generate_token, reset_token_status, TokenStatus, RESET_TOKEN_LEN, SESSION_TOKEN_LEN},
    },
    error::{ApiError, ApiResult, FieldErrors},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?1?\d{9,15}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

/// First space splits first from last name; no space means first only.
fn split_full_name(full_name: &str) -> (String, String) {
    match full_name.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.to_string()),
        None => (full_name.trim().to_string(), String::new()),
    }
}

/// Field-keyed checks that need no datastore. Uniqueness is layered on
/// top by `register`.
fn registration_field_errors(req: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.username.len() < 3 || req.username.len() > 150 {
        errors.insert(
            "username".into(),
            "Username must be between 3 and 150 characters.".into(),
        );
    }
    if !is_valid_email(&req.email) {
        errors.insert("email".into(), "Enter a valid email address.".into());
    }
    if req.password != req.password_confirm {
        errors.insert("password_confirm".into(), "Passwords don't match.".into());
    } else if let Err(msg) = validate_strength(&req.password, &req.username, &req.email) {
        errors.insert("password".into(), msg);
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
    errors
}

/// Best-effort audit write; a failed insert is logged and swallowed so it
/// can never fail the parent authentication operation.
async fn audit(state: &AppState, user_id: uuid::Uuid, meta: &ClientMeta, success: bool) {
    if let Err(err) =
        login_history::append(&state.db, user_id, &meta.ip, &meta.user_agent, success).await
    {
        warn!(error = %err, %user_id, "login history write failed");
    }
}

pub async fn register(
    state: &AppState,
    mut req: RegisterRequest,
    meta: &ClientMeta,
) -> ApiResult<(User, String)> {
    req.email = req.email.trim().to_lowercase();
    req.username = req.username.trim().to_string();

    let mut errors = registration_field_errors(&req);
    if !errors.contains_key("username")
        && User::find_by_username(&state.db, &req.username).await?.is_some()
    {
        errors.insert("username".into(), "Username already exists.".into());
    }
    if !errors.contains_key("email")
        && User::find_by_email(&state.db, &req.email).await?.is_some()
    {
        errors.insert("email".into(), "Email already exists.".into());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let (first_name, last_name) = split_full_name(req.full_name.as_deref().unwrap_or(""));
    let password_hash = hash_password(&req.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username: &req.username,
            email: &req.email,
            password_hash: &password_hash,
            first_name: &first_name,
            last_name: &last_name,
            phone_number: req.phone_number.as_deref().unwrap_or(""),
        },
    )
    .await?;
    UserProfile::get_or_create(&state.db, user.id).await?;

    let token = session_tokens::issue(&state.db, user.id, &generate_token(SESSION_TOKEN_LEN)).await?;
    audit(state, user.id, meta, true).await;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((user, token))
}

/// The authentication attempt state machine. Credentials are checked
/// first; a known user with a wrong password takes the INVALID arm and
/// pays a guard failure, a locked account takes the LOCKED arm without
/// a further increment.
pub async fn authenticate(
    state: &AppState,
    identifier: &str,
    password: &str,
    meta: &ClientMeta,
) -> ApiResult<(User, String)> {
    let Some(user) = User::find_by_identifier(&state.db, identifier).await? else {
        warn!(%identifier, "login attempt for unknown identifier");
        return Err(ApiError::invalid_credentials());
    };

    let now = OffsetDateTime::now_utc();
    let policy = LockoutPolicy::from_config(&state.config.security);

    if !verify_password(password, &user.password_hash)? {
        let guard = repo::record_failure(&state.db, policy, user.id, now).await?;
        audit(state, user.id, meta, false).await;
        warn!(
            user_id = %user.id,
            failed_attempts = guard.failed_attempts,
            "login invalid password"
        );
        return Err(ApiError::invalid_credentials());
    }

    if policy.is_locked(user.guard_state(), now) {
        audit(state, user.id, meta, false).await;
        warn!(user_id = %user.id, "login rejected, account locked");
        return Err(ApiError::account_locked());
    }

    if !user.is_active {
        audit(state, user.id, meta, false).await;
        warn!(user_id = %user.id, "login rejected, account disabled");
        return Err(ApiError::Unauthorized("Account is disabled.".into()));
    }

    repo::record_success(&state.db, user.id, now).await?;
    let token = session_tokens::issue(&state.db, user.id, &generate_token(SESSION_TOKEN_LEN)).await?;
    audit(state, user.id, meta, true).await;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((user, token))
}

/// Always reports success for a well-formed email, whether or not an
/// account exists behind it. Only an actual delivery failure surfaces.
pub async fn request_password_reset(state: &AppState, email: &str) -> ApiResult<()> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::field("email", "Enter a valid email address."));
    }

    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };
    if !user.is_active {
        return Ok(());
    }

    let token = generate_token(RESET_TOKEN_LEN);
    let expires_at = OffsetDateTime::now_utc()
        + Duration::hours(state.config.security.reset_token_ttl_hours);
    reset_tokens::issue(&state.db, user.id, &token, expires_at).await?;

    let reset_url = format!("{}/reset-password?token={}", state.config.frontend_url, token);
    let body = format!(
        "Click the following link to reset your password: {reset_url}"
    );
    if let Err(err) = state.mailer.send(&email, "Password Reset Request", &body).await {
        error!(error = %err, user_id = %user.id, "password reset mail failed");
        return Err(ApiError::Internal(err));
    }

    info!(user_id = %user.id, "password reset mail sent");
    Ok(())
}

pub async fn confirm_password_reset(
    state: &AppState,
    req: &PasswordResetConfirmRequest,
) -> ApiResult<()> {
    if req.new_password != req.new_password_confirm {
        return Err(ApiError::field(
            "new_password_confirm",
            "Passwords don't match.",
        ));
    }

    let invalid = || ApiError::BadRequest("Invalid or expired reset token.".into());

    let Some(reset) = reset_tokens::find(&state.db, &req.token).await? else {
        return Err(invalid());
    };
    let now = OffsetDateTime::now_utc();
    if reset_token_status(reset.is_used, reset.expires_at, now) != TokenStatus::Valid {
        return Err(invalid());
    }

    let Some(user) = User::find_by_id(&state.db, reset.user_id).await? else {
        return Err(invalid());
    };
    if let Err(msg) = validate_strength(&req.new_password, &user.username, &user.email) {
        return Err(ApiError::field("new_password", &msg));
    }

    let password_hash = hash_password(&req.new_password)?;
    // The conditional update re-checks used/expiry, so a raced or replayed
    // confirm lands here with None.
    match reset_tokens::consume(&state.db, &req.token, &password_hash, now).await? {
        Some(user_id) => {
            info!(%user_id, "password reset completed");
            Ok(())
        }
        None => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: "Str0ngPass!".into(),
            password_confirm: "Str0ngPass!".into(),
            full_name: Some("Alice Liddell".into()),
            phone_number: None,
        }
    }

    #[test]
    fn clean_registration_has_no_field_errors() {
        assert!(registration_field_errors(&request()).is_empty());
    }

    #[test]
    fn mismatched_passwords_key_the_confirm_field() {
        let mut req = request();
        req.password_confirm = "Different1!".into();
        let errors = registration_field_errors(&req);
        assert!(errors.contains_key("password_confirm"));
        assert!(!errors.contains_key("password"));
    }

    #[test]
    fn weak_password_keys_the_password_field() {
        let mut req = request();
        req.password = "short1".into();
        req.password_confirm = "short1".into();
        assert!(registration_field_errors(&req).contains_key("password"));
    }

    #[test]
    fn bad_email_and_short_username_both_reported() {
        let mut req = request();
        req.username = "al".into();
        req.email = "not-an-email".into();
        let errors = registration_field_errors(&req);
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn phone_number_is_validated_when_present() {
        let mut req = request();
        req.phone_number = Some("abc".into());
        assert!(registration_field_errors(&req).contains_key("phone_number"));
        req.phone_number = Some("+4915112345678".into());
        assert!(registration_field_errors(&req).is_empty());
    }

    #[test]
    fn full_name_splits_on_first_space_only() {
        assert_eq!(
            split_full_name("Alice van Liddell"),
            ("Alice".into(), "van Liddell".into())
        );
        assert_eq!(split_full_name("Alice"), ("Alice".into(), String::new()));
        assert_eq!(split_full_name(""), (String::new(), String::new()));
    }

    #[test]
    fn email_pattern_accepts_common_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a b@x.com"));
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::guard::{GuardState, LockoutPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub bio: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_verified: bool,
    pub email_verified_at: Option<OffsetDateTime>,
    pub failed_login_attempts: i32,
    pub account_locked_until: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        let joined = format!("{} {}", self.first_name, self.last_name);
        let joined = joined.trim();
        if joined.is_empty() {
            self.username.clone()
        } else {
            joined.to_string()
        }
    }

    pub fn guard_state(&self) -> GuardState {
        GuardState {
            failed_attempts: self.failed_login_attempts,
            locked_until: self.account_locked_until,
        }
    }
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone_number: &'a str,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Login identifier resolution: username first, then email.
    pub async fn find_by_identifier(db: &PgPool, identifier: &str) -> anyhow::Result<Option<User>> {
        if let Some(user) = Self::find_by_username(db, identifier).await? {
            return Ok(Some(user));
        }
        Self::find_by_email(db, identifier).await
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.phone_number)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Everyone except `self_id`; used for update-time uniqueness checks.
    pub async fn email_taken_by_other(
        db: &PgPool,
        self_id: Uuid,
        email: &str,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query("SELECT 1 AS hit FROM users WHERE email = $1 AND id <> $2")
            .bind(email)
            .bind(self_id)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }

    pub async fn list_active(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE is_active ORDER BY created_at")
                .fetch_all(db)
                .await?;
        Ok(users)
    }
}

/// Applies one guard failure under a row lock, so concurrent attempts for
/// the same user serialize on the datastore rather than in-process.
pub async fn record_failure(
    db: &PgPool,
    policy: LockoutPolicy,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<GuardState> {
    let mut tx = db.begin().await?;
    let row = sqlx::query(
        "SELECT failed_login_attempts, account_locked_until FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;
    let current = GuardState {
        failed_attempts: row.try_get("failed_login_attempts")?,
        locked_until: row.try_get("account_locked_until")?,
    };
    let next = policy.on_failure(current, now);
    sqlx::query(
        r#"
        UPDATE users
        SET failed_login_attempts = $2, account_locked_until = $3, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(next.failed_attempts)
    .bind(next.locked_until)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(next)
}

/// Clears the counter and lockout and stamps last_login.
pub async fn record_success(
    db: &PgPool,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<()> {
    let cleared = GuardState::clear();
    sqlx::query(
        r#"
        UPDATE users
        SET failed_login_attempts = $2, account_locked_until = $3,
            last_login = $4, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .bind(cleared.failed_attempts)
    .bind(cleared.locked_until)
    .bind(now)
    .execute(db)
    .await?;
    Ok(())
}

pub mod session_tokens {
    use super::*;

    /// Get-or-create of the user's single bearer token. The conflict arm
    /// leaves the stored token untouched so repeat logins reuse it.
    pub async fn issue(db: &PgPool, user_id: Uuid, fresh_token: &str) -> anyhow::Result<String> {
        let row = sqlx::query(
            r#"
            INSERT INTO session_tokens (user_id, token)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = excluded.user_id
            RETURNING token
            "#,
        )
        .bind(user_id)
        .bind(fresh_token)
        .fetch_one(db)
        .await?;
        Ok(row.try_get("token")?)
    }

    pub async fn revoke(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM session_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn find_user(db: &PgPool, token: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN session_tokens t ON t.user_id = u.id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub user_id: Uuid,
    pub token: String,
    pub is_used: bool,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

pub mod reset_tokens {
    use super::*;

    /// One row per user; a repeated request overwrites token, expiry and
    /// used flag in place.
    pub async fn issue(
        db: &PgPool,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET token = excluded.token, expires_at = excluded.expires_at,
                is_used = FALSE, created_at = now()
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find(db: &PgPool, token: &str) -> anyhow::Result<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetToken>(
            "SELECT * FROM password_reset_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Marks the token used and swaps the password hash in one transaction.
    /// The conditional UPDATE makes a replayed confirm come back None even
    /// when two requests race.
    pub async fn consume(
        db: &PgPool,
        token: &str,
        new_password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Uuid>> {
        let mut tx = db.begin().await?;
        let row = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET is_used = TRUE
            WHERE token = $1 AND is_used = FALSE AND expires_at > $2
            RETURNING user_id
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let user_id: Uuid = row.try_get("user_id")?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(new_password_hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(user_id))
    }
}

pub mod login_history {
    use super::*;

    pub async fn append(
        db: &PgPool,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
        success: bool,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_history (user_id, ip_address, user_agent, login_successful)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(success)
        .execute(db)
        .await?;
        Ok(())
    }
}

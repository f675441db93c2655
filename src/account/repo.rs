use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::User;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub company: String,
    pub job_title: String,
    pub website: String,
    pub preferred_language: String,
    pub timezone: String,
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub profile_visibility: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User-row fields a profile update may touch. `None` keeps the stored
/// value.
#[derive(Debug, Default)]
pub struct UserChanges<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub bio: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct ProfileChanges<'a> {
    pub company: Option<&'a str>,
    pub job_title: Option<&'a str>,
    pub website: Option<&'a str>,
    pub preferred_language: Option<&'a str>,
    pub timezone: Option<&'a str>,
    pub email_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub profile_visibility: Option<&'a str>,
}

impl UserProfile {
    /// The profile row is created lazily the first time it is needed.
    pub async fn get_or_create(db: &PgPool, user_id: Uuid) -> anyhow::Result<UserProfile> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO user_profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = excluded.user_id
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(profile)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        changes: &ProfileChanges<'_>,
    ) -> anyhow::Result<UserProfile> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles
            SET company = COALESCE($2, company),
                job_title = COALESCE($3, job_title),
                website = COALESCE($4, website),
                preferred_language = COALESCE($5, preferred_language),
                timezone = COALESCE($6, timezone),
                email_notifications = COALESCE($7, email_notifications),
                push_notifications = COALESCE($8, push_notifications),
                profile_visibility = COALESCE($9, profile_visibility),
                updated_at = now()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(changes.company)
        .bind(changes.job_title)
        .bind(changes.website)
        .bind(changes.preferred_language)
        .bind(changes.timezone)
        .bind(changes.email_notifications)
        .bind(changes.push_notifications)
        .bind(changes.profile_visibility)
        .fetch_one(db)
        .await?;
        Ok(profile)
    }
}

pub async fn update_user(
    db: &PgPool,
    user_id: Uuid,
    changes: &UserChanges<'_>,
) -> anyhow::Result<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            email = COALESCE($4, email),
            phone_number = COALESCE($5, phone_number),
            bio = COALESCE($6, bio),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.first_name)
    .bind(changes.last_name)
    .bind(changes.email)
    .bind(changes.phone_number)
    .bind(changes.bio)
    .fetch_one(db)
    .await?;
    Ok(user)
}

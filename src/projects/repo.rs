use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub project_type: String,
    pub status: String,
    pub owner_id: Uuid,
    pub is_public: bool,
    pub allow_anonymous_annotations: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub struct NewProject<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub project_type: &'a str,
    pub is_public: bool,
    pub allow_anonymous_annotations: bool,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProjectChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub project_type: Option<&'a str>,
    pub status: Option<&'a str>,
    pub is_public: Option<bool>,
    pub allow_anonymous_annotations: Option<bool>,
}

impl Project {
    pub async fn create(
        db: &PgPool,
        owner_id: Uuid,
        new: NewProject<'_>,
    ) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, description, project_type, owner_id,
                                  is_public, allow_anonymous_annotations)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.name)
        .bind(new.description)
        .bind(new.project_type)
        .bind(owner_id)
        .bind(new.is_public)
        .bind(new.allow_anonymous_annotations)
        .fetch_one(db)
        .await?;
        Ok(project)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(project)
    }

    /// Projects the user owns or collaborates on, most recently touched
    /// first.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT DISTINCT p.* FROM projects p
            LEFT JOIN project_collaborators c ON c.project_id = p.id
            WHERE p.owner_id = $1 OR c.user_id = $1
            ORDER BY p.updated_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(projects)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &ProjectChanges<'_>,
    ) -> anyhow::Result<Project> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                project_type = COALESCE($4, project_type),
                status = COALESCE($5, status),
                is_public = COALESCE($6, is_public),
                allow_anonymous_annotations = COALESCE($7, allow_anonymous_annotations),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.project_type)
        .bind(changes.status)
        .bind(changes.is_public)
        .bind(changes.allow_anonymous_annotations)
        .fetch_one(db)
        .await?;
        Ok(project)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn is_collaborator(
        db: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            "SELECT 1 AS hit FROM project_collaborators WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row.is_some())
    }

    pub async fn add_collaborator(
        db: &PgPool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO project_collaborators (project_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Dataset {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub metadata: serde_json::Value,
    pub is_processed: bool,
    pub processing_status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub struct NewDataset<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub file_path: &'a str,
    pub file_size: i64,
    pub file_type: &'a str,
    pub metadata: &'a serde_json::Value,
}

#[derive(Debug, Default)]
pub struct DatasetChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
    pub is_processed: Option<bool>,
    pub processing_status: Option<&'a str>,
}

impl Dataset {
    pub async fn create(
        db: &PgPool,
        project_id: Uuid,
        new: NewDataset<'_>,
    ) -> anyhow::Result<Dataset> {
        let dataset = sqlx::query_as::<_, Dataset>(
            r#"
            INSERT INTO datasets (project_id, name, description, file_path,
                                  file_size, file_type, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(new.name)
        .bind(new.description)
        .bind(new.file_path)
        .bind(new.file_size)
        .bind(new.file_type)
        .bind(new.metadata)
        .fetch_one(db)
        .await?;
        Ok(dataset)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Dataset>> {
        let dataset = sqlx::query_as::<_, Dataset>("SELECT * FROM datasets WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(dataset)
    }

    pub async fn list_by_project(db: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<Dataset>> {
        let datasets = sqlx::query_as::<_, Dataset>(
            "SELECT * FROM datasets WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(db)
        .await?;
        Ok(datasets)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &DatasetChanges<'_>,
    ) -> anyhow::Result<Dataset> {
        let dataset = sqlx::query_as::<_, Dataset>(
            r#"
            UPDATE datasets
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                metadata = COALESCE($4, metadata),
                is_processed = COALESCE($5, is_processed),
                processing_status = COALESCE($6, processing_status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.metadata)
        .bind(changes.is_processed)
        .bind(changes.processing_status)
        .fetch_one(db)
        .await?;
        Ok(dataset)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM datasets WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Annotation {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub annotator_id: Uuid,
    pub annotation_type: String,
    pub content: serde_json::Value,
    pub confidence_score: f64,
    pub is_verified: bool,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Annotation {
    /// One annotation per (dataset, annotator, type); the unique index
    /// surfaces a second submit as a constraint violation.
    pub async fn create(
        db: &PgPool,
        dataset_id: Uuid,
        annotator_id: Uuid,
        annotation_type: &str,
        content: &serde_json::Value,
        confidence_score: f64,
    ) -> anyhow::Result<Annotation> {
        let annotation = sqlx::query_as::<_, Annotation>(
            r#"
            INSERT INTO annotations (dataset_id, annotator_id, annotation_type,
                                     content, confidence_score)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(dataset_id)
        .bind(annotator_id)
        .bind(annotation_type)
        .bind(content)
        .bind(confidence_score)
        .fetch_one(db)
        .await?;
        Ok(annotation)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Annotation>> {
        let annotation = sqlx::query_as::<_, Annotation>("SELECT * FROM annotations WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(annotation)
    }

    pub async fn list_by_dataset(db: &PgPool, dataset_id: Uuid) -> anyhow::Result<Vec<Annotation>> {
        let annotations = sqlx::query_as::<_, Annotation>(
            "SELECT * FROM annotations WHERE dataset_id = $1 ORDER BY created_at DESC",
        )
        .bind(dataset_id)
        .fetch_all(db)
        .await?;
        Ok(annotations)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        content: Option<&serde_json::Value>,
        confidence_score: Option<f64>,
    ) -> anyhow::Result<Annotation> {
        let annotation = sqlx::query_as::<_, Annotation>(
            r#"
            UPDATE annotations
            SET content = COALESCE($2, content),
                confidence_score = COALESCE($3, confidence_score),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(confidence_score)
        .fetch_one(db)
        .await?;
        Ok(annotation)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM annotations WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn verify(
        db: &PgPool,
        id: Uuid,
        verifier_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Annotation> {
        let annotation = sqlx::query_as::<_, Annotation>(
            r#"
            UPDATE annotations
            SET is_verified = TRUE, verified_by = $2, verified_at = $3, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(verifier_id)
        .bind(now)
        .fetch_one(db)
        .await?;
        Ok(annotation)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnnotationTemplate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
    pub is_default: bool,
    pub is_required: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl AnnotationTemplate {
    pub async fn create(
        db: &PgPool,
        project_id: Uuid,
        name: &str,
        description: &str,
        schema: &serde_json::Value,
        is_default: bool,
        is_required: bool,
    ) -> anyhow::Result<AnnotationTemplate> {
        let template = sqlx::query_as::<_, AnnotationTemplate>(
            r#"
            INSERT INTO annotation_templates (project_id, name, description,
                                              schema, is_default, is_required)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(name)
        .bind(description)
        .bind(schema)
        .bind(is_default)
        .bind(is_required)
        .fetch_one(db)
        .await?;
        Ok(template)
    }

    pub async fn list_by_project(
        db: &PgPool,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<AnnotationTemplate>> {
        let templates = sqlx::query_as::<_, AnnotationTemplate>(
            "SELECT * FROM annotation_templates WHERE project_id = $1 ORDER BY name",
        )
        .bind(project_id)
        .fetch_all(db)
        .await?;
        Ok(templates)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectInvitation {
    pub id: Uuid,
    pub project_id: Uuid,
    pub inviter_id: Uuid,
    pub invitee_email: String,
    pub invitee_id: Option<Uuid>,
    pub role: String,
    pub message: String,
    pub status: String,
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub responded_at: Option<OffsetDateTime>,
}

impl ProjectInvitation {
    pub async fn create(
        db: &PgPool,
        project_id: Uuid,
        inviter_id: Uuid,
        invitee_email: &str,
        role: &str,
        message: &str,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<ProjectInvitation> {
        let invitation = sqlx::query_as::<_, ProjectInvitation>(
            r#"
            INSERT INTO project_invitations (project_id, inviter_id, invitee_email,
                                             role, message, token, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(inviter_id)
        .bind(invitee_email)
        .bind(role)
        .bind(message)
        .bind(token)
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(invitation)
    }

    pub async fn find_by_token(
        db: &PgPool,
        token: &str,
    ) -> anyhow::Result<Option<ProjectInvitation>> {
        let invitation = sqlx::query_as::<_, ProjectInvitation>(
            "SELECT * FROM project_invitations WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(invitation)
    }

    pub async fn list_by_project(
        db: &PgPool,
        project_id: Uuid,
    ) -> anyhow::Result<Vec<ProjectInvitation>> {
        let invitations = sqlx::query_as::<_, ProjectInvitation>(
            "SELECT * FROM project_invitations WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(db)
        .await?;
        Ok(invitations)
    }

    /// Records the response, resolving the invitee to the responding
    /// account.
    pub async fn mark_responded(
        db: &PgPool,
        id: Uuid,
        status: &str,
        invitee_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<ProjectInvitation> {
        let invitation = sqlx::query_as::<_, ProjectInvitation>(
            r#"
            UPDATE project_invitations
            SET status = $2, invitee_id = $3, responded_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(invitee_id)
        .bind(now)
        .fetch_one(db)
        .await?;
        Ok(invitation)
    }

    pub async fn mark_expired(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE project_invitations SET status = 'expired' WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// True when the sqlx error behind an anyhow chain is a Postgres unique
/// constraint violation.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}

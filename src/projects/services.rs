use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        repo::User,
        services::is_valid_email,
        tokens::{generate_token, INVITATION_TOKEN_LEN},
    },
    error::{ApiError, ApiResult, FieldErrors},
    projects::{
        dto::{
            CreateAnnotationRequest, CreateDatasetRequest, CreateInvitationRequest,
            CreateProjectRequest, UpdateProjectRequest,
        },
        repo::{
            is_unique_violation, Annotation, Dataset, NewDataset, NewProject, Project,
            ProjectChanges, ProjectInvitation,
        },
    },
    state::AppState,
};

pub const PROJECT_TYPES: [&str; 4] = ["audio", "video", "image", "text"];
pub const PROJECT_STATUSES: [&str; 5] = ["draft", "active", "paused", "completed", "archived"];
pub const ANNOTATION_TYPES: [&str; 6] = [
    "classification",
    "segmentation",
    "bounding_box",
    "keypoint",
    "transcription",
    "translation",
];
pub const INVITATION_ROLES: [&str; 3] = ["annotator", "reviewer", "admin"];

/// Owner and collaborators are members; public projects are additionally
/// readable by anyone authenticated.
pub fn is_member(project: &Project, user_id: Uuid, is_collaborator: bool) -> bool {
    project.owner_id == user_id || is_collaborator
}

pub fn can_view(project: &Project, user_id: Uuid, is_collaborator: bool) -> bool {
    is_member(project, user_id, is_collaborator) || project.is_public
}

pub fn invitation_expired(expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now > expires_at
}

fn project_field_errors(req: &CreateProjectRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if req.name.trim().is_empty() || req.name.len() > 200 {
        errors.insert(
            "name".into(),
            "Name must be between 1 and 200 characters.".into(),
        );
    }
    if !PROJECT_TYPES.contains(&req.project_type.as_str()) {
        errors.insert(
            "project_type".into(),
            "Type must be one of: audio, video, image, text.".into(),
        );
    }
    errors
}

async fn find_project(state: &AppState, id: Uuid) -> ApiResult<Project> {
    Project::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found.".into()))
}

/// Loads the project and rejects with 404 unless the caller may read it.
/// Hidden projects 404 rather than 403 so their existence stays private.
pub async fn require_visible(state: &AppState, id: Uuid, user: &User) -> ApiResult<Project> {
    let project = find_project(state, id).await?;
    let collaborating = Project::is_collaborator(&state.db, project.id, user.id).await?;
    if !can_view(&project, user.id, collaborating) {
        return Err(ApiError::NotFound("Project not found.".into()));
    }
    Ok(project)
}

/// Owner or collaborator; required for annotation writes.
pub async fn require_member(state: &AppState, id: Uuid, user: &User) -> ApiResult<Project> {
    let project = find_project(state, id).await?;
    let collaborating = Project::is_collaborator(&state.db, project.id, user.id).await?;
    if !is_member(&project, user.id, collaborating) {
        return Err(ApiError::NotFound("Project not found.".into()));
    }
    Ok(project)
}

/// Owner only; required for project, dataset, template and invitation
/// writes.
pub async fn require_owner(state: &AppState, id: Uuid, user: &User) -> ApiResult<Project> {
    let project = find_project(state, id).await?;
    if project.owner_id != user.id {
        let collaborating = Project::is_collaborator(&state.db, project.id, user.id).await?;
        if can_view(&project, user.id, collaborating) {
            return Err(ApiError::Forbidden(
                "Only the project owner can perform this action.".into(),
            ));
        }
        return Err(ApiError::NotFound("Project not found.".into()));
    }
    Ok(project)
}

pub async fn create_project(
    state: &AppState,
    user: &User,
    req: &CreateProjectRequest,
) -> ApiResult<Project> {
    let errors = project_field_errors(req);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let project = Project::create(
        &state.db,
        user.id,
        NewProject {
            name: req.name.trim(),
            description: &req.description,
            project_type: &req.project_type,
            is_public: req.is_public,
            allow_anonymous_annotations: req.allow_anonymous_annotations,
        },
    )
    .await?;
    info!(project_id = %project.id, owner_id = %user.id, "project created");
    Ok(project)
}

pub async fn update_project(
    state: &AppState,
    project: &Project,
    req: &UpdateProjectRequest,
) -> ApiResult<Project> {
    let mut errors = FieldErrors::new();
    if let Some(name) = req.name.as_deref() {
        if name.trim().is_empty() || name.len() > 200 {
            errors.insert(
                "name".into(),
                "Name must be between 1 and 200 characters.".into(),
            );
        }
    }
    if let Some(project_type) = req.project_type.as_deref() {
        if !PROJECT_TYPES.contains(&project_type) {
            errors.insert(
                "project_type".into(),
                "Type must be one of: audio, video, image, text.".into(),
            );
        }
    }
    if let Some(status) = req.status.as_deref() {
        if !PROJECT_STATUSES.contains(&status) {
            errors.insert(
                "status".into(),
                "Status must be one of: draft, active, paused, completed, archived.".into(),
            );
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let updated = Project::update(
        &state.db,
        project.id,
        &ProjectChanges {
            name: req.name.as_deref().map(str::trim),
            description: req.description.as_deref(),
            project_type: req.project_type.as_deref(),
            status: req.status.as_deref(),
            is_public: req.is_public,
            allow_anonymous_annotations: req.allow_anonymous_annotations,
        },
    )
    .await?;
    Ok(updated)
}

pub async fn create_dataset(
    state: &AppState,
    project: &Project,
    req: &CreateDatasetRequest,
) -> ApiResult<Dataset> {
    let mut errors = FieldErrors::new();
    if req.name.trim().is_empty() || req.name.len() > 200 {
        errors.insert(
            "name".into(),
            "Name must be between 1 and 200 characters.".into(),
        );
    }
    if req.file_path.trim().is_empty() {
        errors.insert("file_path".into(), "File path is required.".into());
    }
    if req.file_type.trim().is_empty() {
        errors.insert("file_type".into(), "File type is required.".into());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let dataset = Dataset::create(
        &state.db,
        project.id,
        NewDataset {
            name: req.name.trim(),
            description: &req.description,
            file_path: &req.file_path,
            file_size: req.file_size,
            file_type: &req.file_type,
            metadata: &req.metadata,
        },
    )
    .await?;
    info!(dataset_id = %dataset.id, project_id = %project.id, "dataset created");
    Ok(dataset)
}

pub async fn create_annotation(
    state: &AppState,
    dataset: &Dataset,
    user: &User,
    req: &CreateAnnotationRequest,
) -> ApiResult<Annotation> {
    if !ANNOTATION_TYPES.contains(&req.annotation_type.as_str()) {
        return Err(ApiError::field(
            "annotation_type",
            "Type must be one of: classification, segmentation, bounding_box, \
             keypoint, transcription, translation.",
        ));
    }

    match Annotation::create(
        &state.db,
        dataset.id,
        user.id,
        &req.annotation_type,
        &req.content,
        req.confidence_score,
    )
    .await
    {
        Ok(annotation) => Ok(annotation),
        Err(err) if is_unique_violation(&err) => Err(ApiError::field(
            "annotation_type",
            "You have already submitted this annotation type for this dataset.",
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn create_invitation(
    state: &AppState,
    project: &Project,
    inviter: &User,
    req: &CreateInvitationRequest,
) -> ApiResult<ProjectInvitation> {
    let invitee_email = req.invitee_email.trim().to_lowercase();
    let mut errors = FieldErrors::new();
    if !is_valid_email(&invitee_email) {
        errors.insert("invitee_email".into(), "Enter a valid email address.".into());
    }
    if !INVITATION_ROLES.contains(&req.role.as_str()) {
        errors.insert(
            "role".into(),
            "Role must be one of: annotator, reviewer, admin.".into(),
        );
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let token = generate_token(INVITATION_TOKEN_LEN);
    let expires_at = OffsetDateTime::now_utc()
        + Duration::days(state.config.security.invitation_ttl_days);
    let invitation = ProjectInvitation::create(
        &state.db,
        project.id,
        inviter.id,
        &invitee_email,
        &req.role,
        &req.message,
        &token,
        expires_at,
    )
    .await?;

    // Delivery is best-effort; the invitation stands either way and the
    // owner can still share the link out of band.
    let invite_url = format!("{}/invitations/{}", state.config.frontend_url, token);
    let body = format!(
        "{} invited you to the project \"{}\". Open the following link to respond: {}",
        inviter.full_name(),
        project.name,
        invite_url
    );
    if let Err(err) = state
        .mailer
        .send(&invitee_email, "Project Invitation", &body)
        .await
    {
        warn!(error = %err, invitation_id = %invitation.id, "invitation mail failed");
    }

    info!(invitation_id = %invitation.id, project_id = %project.id, "invitation created");
    Ok(invitation)
}

/// Accept or decline by token. An expired pending invitation flips to
/// `expired` on first touch and the response is rejected.
pub async fn respond_to_invitation(
    state: &AppState,
    token: &str,
    user: &User,
    accept: bool,
) -> ApiResult<ProjectInvitation> {
    let Some(invitation) = ProjectInvitation::find_by_token(&state.db, token).await? else {
        return Err(ApiError::NotFound("Invitation not found.".into()));
    };
    if invitation.status != "pending" {
        return Err(ApiError::BadRequest(
            "Invitation has already been responded to.".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    if invitation_expired(invitation.expires_at, now) {
        ProjectInvitation::mark_expired(&state.db, invitation.id).await?;
        return Err(ApiError::BadRequest("Invitation has expired.".into()));
    }

    let status = if accept { "accepted" } else { "declined" };
    let invitation =
        ProjectInvitation::mark_responded(&state.db, invitation.id, status, user.id, now).await?;
    if accept {
        Project::add_collaborator(&state.db, invitation.project_id, user.id).await?;
    }

    info!(
        invitation_id = %invitation.id,
        user_id = %user.id,
        %status,
        "invitation responded"
    );
    Ok(invitation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(owner: Uuid, public: bool) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "field recordings".into(),
            description: String::new(),
            project_type: "audio".into(),
            status: "draft".into(),
            owner_id: owner,
            is_public: public,
            allow_anonymous_annotations: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn owner_and_collaborator_are_members() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let p = project(owner, false);
        assert!(is_member(&p, owner, false));
        assert!(is_member(&p, stranger, true));
        assert!(!is_member(&p, stranger, false));
    }

    #[test]
    fn public_projects_are_viewable_by_anyone() {
        let stranger = Uuid::new_v4();
        assert!(can_view(&project(Uuid::new_v4(), true), stranger, false));
        assert!(!can_view(&project(Uuid::new_v4(), false), stranger, false));
    }

    #[test]
    fn invitation_expires_strictly_after_deadline() {
        let deadline = OffsetDateTime::UNIX_EPOCH + Duration::days(7);
        assert!(!invitation_expired(deadline, deadline));
        assert!(!invitation_expired(deadline, deadline - Duration::seconds(1)));
        assert!(invitation_expired(deadline, deadline + Duration::seconds(1)));
    }

    #[test]
    fn project_validation_checks_name_and_type() {
        let req = CreateProjectRequest {
            name: "  ".into(),
            description: String::new(),
            project_type: "hologram".into(),
            is_public: false,
            allow_anonymous_annotations: false,
        };
        let errors = project_field_errors(&req);
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("project_type"));
    }

    #[test]
    fn project_validation_accepts_known_types() {
        for project_type in PROJECT_TYPES {
            let req = CreateProjectRequest {
                name: "ok".into(),
                description: String::new(),
                project_type: project_type.into(),
                is_public: false,
                allow_anonymous_annotations: false,
            };
            assert!(project_field_errors(&req).is_empty());
        }
    }
}

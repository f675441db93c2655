use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::CurrentUser, repo::User},
    error::{ApiError, ApiResult},
    projects::{
        dto::{
            CreateAnnotationRequest, CreateDatasetRequest, CreateInvitationRequest,
            CreateProjectRequest, CreateTemplateRequest, UpdateAnnotationRequest,
            UpdateDatasetRequest, UpdateProjectRequest,
        },
        repo::{Annotation, AnnotationTemplate, Dataset, DatasetChanges, Project, ProjectInvitation},
        services,
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/", get(list_projects).post(create_project))
        .route(
            "/projects/:id/",
            get(get_project).put(put_project).delete(delete_project),
        )
        .route(
            "/projects/:id/datasets/",
            get(list_datasets).post(create_dataset),
        )
        .route(
            "/datasets/:id/",
            get(get_dataset).put(put_dataset).delete(delete_dataset),
        )
        .route(
            "/datasets/:id/annotations/",
            get(list_annotations).post(create_annotation),
        )
        .route(
            "/annotations/:id/",
            put(put_annotation).delete(delete_annotation),
        )
        .route("/annotations/:id/verify/", post(verify_annotation))
        .route(
            "/projects/:id/templates/",
            get(list_templates).post(create_template),
        )
        .route(
            "/projects/:id/invitations/",
            get(list_invitations).post(create_invitation),
        )
        .route("/invitations/:token/accept/", post(accept_invitation))
        .route("/invitations/:token/decline/", post(decline_invitation))
}

// --- projects ---

#[instrument(skip(state, user))]
async fn list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(Project::list_for_user(&state.db, user.id).await?))
}

#[instrument(skip(state, user, payload))]
async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = services::create_project(&state, &user, &payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state, user))]
async fn get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(services::require_visible(&state, id, &user).await?))
}

#[instrument(skip(state, user, payload))]
async fn put_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = services::require_owner(&state, id, &user).await?;
    Ok(Json(services::update_project(&state, &project, &payload).await?))
}

#[instrument(skip(state, user))]
async fn delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let project = services::require_owner(&state, id, &user).await?;
    Project::delete(&state.db, project.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- datasets ---

#[instrument(skip(state, user))]
async fn list_datasets(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Dataset>>> {
    let project = services::require_visible(&state, id, &user).await?;
    Ok(Json(Dataset::list_by_project(&state.db, project.id).await?))
}

#[instrument(skip(state, user, payload))]
async fn create_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateDatasetRequest>,
) -> ApiResult<(StatusCode, Json<Dataset>)> {
    let project = services::require_owner(&state, id, &user).await?;
    let dataset = services::create_dataset(&state, &project, &payload).await?;
    Ok((StatusCode::CREATED, Json(dataset)))
}

async fn find_dataset(state: &AppState, id: Uuid) -> ApiResult<Dataset> {
    Dataset::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Dataset not found.".into()))
}

#[instrument(skip(state, user))]
async fn get_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Dataset>> {
    let dataset = find_dataset(&state, id).await?;
    services::require_visible(&state, dataset.project_id, &user).await?;
    Ok(Json(dataset))
}

#[instrument(skip(state, user, payload))]
async fn put_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDatasetRequest>,
) -> ApiResult<Json<Dataset>> {
    let dataset = find_dataset(&state, id).await?;
    services::require_owner(&state, dataset.project_id, &user).await?;
    let dataset = Dataset::update(
        &state.db,
        dataset.id,
        &DatasetChanges {
            name: payload.name.as_deref(),
            description: payload.description.as_deref(),
            metadata: payload.metadata.as_ref(),
            is_processed: payload.is_processed,
            processing_status: payload.processing_status.as_deref(),
        },
    )
    .await?;
    Ok(Json(dataset))
}

#[instrument(skip(state, user))]
async fn delete_dataset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let dataset = find_dataset(&state, id).await?;
    services::require_owner(&state, dataset.project_id, &user).await?;
    Dataset::delete(&state.db, dataset.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- annotations ---

#[instrument(skip(state, user))]
async fn list_annotations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Annotation>>> {
    let dataset = find_dataset(&state, id).await?;
    services::require_visible(&state, dataset.project_id, &user).await?;
    Ok(Json(Annotation::list_by_dataset(&state.db, dataset.id).await?))
}

#[instrument(skip(state, user, payload))]
async fn create_annotation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateAnnotationRequest>,
) -> ApiResult<(StatusCode, Json<Annotation>)> {
    let dataset = find_dataset(&state, id).await?;
    services::require_member(&state, dataset.project_id, &user).await?;
    let annotation = services::create_annotation(&state, &dataset, &user, &payload).await?;
    Ok((StatusCode::CREATED, Json(annotation)))
}

/// The annotation, after checking the caller may touch it: its own
/// annotator always, the project owner otherwise.
async fn annotation_for_update(state: &AppState, id: Uuid, user: &User) -> ApiResult<Annotation> {
    let annotation = Annotation::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Annotation not found.".into()))?;
    let dataset = find_dataset(state, annotation.dataset_id).await?;
    let project = services::require_member(state, dataset.project_id, user).await?;
    if annotation.annotator_id != user.id && project.owner_id != user.id {
        return Err(ApiError::Forbidden(
            "You can only modify your own annotations.".into(),
        ));
    }
    Ok(annotation)
}

#[instrument(skip(state, user, payload))]
async fn put_annotation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAnnotationRequest>,
) -> ApiResult<Json<Annotation>> {
    let annotation = annotation_for_update(&state, id, &user).await?;
    let annotation = Annotation::update(
        &state.db,
        annotation.id,
        payload.content.as_ref(),
        payload.confidence_score,
    )
    .await?;
    Ok(Json(annotation))
}

#[instrument(skip(state, user))]
async fn delete_annotation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let annotation = annotation_for_update(&state, id, &user).await?;
    Annotation::delete(&state.db, annotation.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
async fn verify_annotation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Annotation>> {
    let annotation = Annotation::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Annotation not found.".into()))?;
    let dataset = find_dataset(&state, annotation.dataset_id).await?;
    services::require_member(&state, dataset.project_id, &user).await?;
    let annotation =
        Annotation::verify(&state.db, annotation.id, user.id, OffsetDateTime::now_utc()).await?;
    Ok(Json(annotation))
}

// --- templates ---

#[instrument(skip(state, user))]
async fn list_templates(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<AnnotationTemplate>>> {
    let project = services::require_visible(&state, id, &user).await?;
    Ok(Json(
        AnnotationTemplate::list_by_project(&state.db, project.id).await?,
    ))
}

#[instrument(skip(state, user, payload))]
async fn create_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<AnnotationTemplate>)> {
    let project = services::require_owner(&state, id, &user).await?;
    if payload.name.trim().is_empty() || payload.name.len() > 200 {
        return Err(ApiError::field(
            "name",
            "Name must be between 1 and 200 characters.",
        ));
    }
    let template = AnnotationTemplate::create(
        &state.db,
        project.id,
        payload.name.trim(),
        &payload.description,
        &payload.schema,
        payload.is_default,
        payload.is_required,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

// --- invitations ---

#[instrument(skip(state, user))]
async fn list_invitations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProjectInvitation>>> {
    let project = services::require_owner(&state, id, &user).await?;
    Ok(Json(
        ProjectInvitation::list_by_project(&state.db, project.id).await?,
    ))
}

#[instrument(skip(state, user, payload))]
async fn create_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateInvitationRequest>,
) -> ApiResult<(StatusCode, Json<ProjectInvitation>)> {
    let project = services::require_owner(&state, id, &user).await?;
    let invitation = services::create_invitation(&state, &project, &user, &payload).await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[instrument(skip(state, user))]
async fn accept_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    services::respond_to_invitation(&state, &token, &user, true).await?;
    Ok(Json(MessageResponse::new("Invitation accepted")))
}

#[instrument(skip(state, user))]
async fn decline_invitation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    services::respond_to_invitation(&state, &token, &user, false).await?;
    Ok(Json(MessageResponse::new("Invitation declined")))
}

use serde::Deserialize;

fn default_metadata() -> serde_json::Value {
    serde_json::json!({})
}

fn default_confidence() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_role() -> String {
    "annotator".into()
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project_type: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub allow_anonymous_annotations: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_type: Option<String>,
    pub status: Option<String>,
    pub is_public: Option<bool>,
    pub allow_anonymous_annotations: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: i64,
    pub file_type: String,
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDatasetRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub is_processed: Option<bool>,
    pub processing_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAnnotationRequest {
    pub annotation_type: String,
    pub content: serde_json::Value,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAnnotationRequest {
    pub content: Option<serde_json::Value>,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub schema: serde_json::Value,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub invitee_email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_metadata_defaults_to_empty_object() {
        let req: CreateDatasetRequest = serde_json::from_str(
            r#"{"name": "takes", "file_path": "audio/takes.tar", "file_type": "wav"}"#,
        )
        .unwrap();
        assert_eq!(req.metadata, serde_json::json!({}));
        assert_eq!(req.file_size, 0);
    }

    #[test]
    fn annotation_confidence_defaults_to_one() {
        let req: CreateAnnotationRequest = serde_json::from_str(
            r#"{"annotation_type": "classification", "content": {"label": "speech"}}"#,
        )
        .unwrap();
        assert_eq!(req.confidence_score, 1.0);
    }

    #[test]
    fn invitation_role_defaults_to_annotator() {
        let req: CreateInvitationRequest =
            serde_json::from_str(r#"{"invitee_email": "b@x.com"}"#).unwrap();
        assert_eq!(req.role, "annotator");
        assert_eq!(req.message, "");
    }

    #[test]
    fn template_is_required_by_default() {
        let req: CreateTemplateRequest =
            serde_json::from_str(r#"{"name": "labels", "schema": {"type": "object"}}"#).unwrap();
        assert!(req.is_required);
        assert!(!req.is_default);
    }
}

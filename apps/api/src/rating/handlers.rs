use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::rating::coordinator::{RateOutcome, RateRequest, RateResponse};
use crate::state::AppState;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// POST /api/v1/resumes/rate
///
/// Multipart form: `file` (a PDF resume, required) and `user_id` (optional).
pub async fn handle_rate_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RateResponse>, AppError> {
    let mut document: Option<Bytes> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field.content_type().map(str::to_string);
                if content_type.as_deref() != Some(PDF_CONTENT_TYPE) {
                    return Err(AppError::Validation(
                        "Invalid file type. Please upload a PDF.".to_string(),
                    ));
                }
                document = Some(field.bytes().await?);
            }
            "user_id" => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    user_id = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    let document =
        document.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let user_id = user_id.unwrap_or_else(|| state.config.default_user_id.clone());
    info!(
        "Received resume upload ({} bytes) for user {user_id}",
        document.len()
    );

    let resume_text = state.extractor.extract(document).await?;

    match state
        .coordinator
        .handle_request(RateRequest {
            user_id,
            resume_text,
        })
        .await?
    {
        RateOutcome::Completed(response) => Ok(Json(response)),
        RateOutcome::Failed(failure) => Err(AppError::PipelineFailed {
            step_index: failure.step_index,
            message: failure.message,
        }),
    }
}

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::database::models::AttachmentMeta;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// GET /api/tickets/:id/attachments - metadata only, content stays out of
/// list responses
pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<AttachmentMeta>> {
    let attachments = state.tickets().attachments(&actor, id).await?;
    Ok(ApiResponse::success(attachments))
}

/// POST /api/tickets/:id/attachments?filename=… - raw-body upload. The
/// bytes arrive already decoded; content type is taken from the request
/// header, size is checked against the configured ceiling.
pub async fn post(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<AttachmentMeta> {
    let filename = query
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::field_error("filename", "This field is required"))?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let meta = state
        .tickets()
        .add_attachment(&actor, id, filename, content_type, body.to_vec())
        .await?;
    Ok(ApiResponse::created(meta))
}

/// GET /api/tickets/:id/attachments/:aid - download the stored bytes
pub async fn download(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path((id, attachment_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let attachment = state.tickets().attachment(&actor, id, attachment_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, attachment.content_type.clone()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment.filename),
            ),
        ],
        attachment.data,
    )
        .into_response())
}

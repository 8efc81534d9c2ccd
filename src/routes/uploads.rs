use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    routing::post,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(upload))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadData {
    /// Stable retrieval path, served under `/uploads`.
    pub url: String,
    pub storage_path: String,
    pub bytes: usize,
}

/// Store a drawing and hand back its retrieval URL. Bodies are raw bytes;
/// files land under a per-user directory with a fresh name so re-uploads of
/// the same drawing never collide.
#[utoipa::path(
    post,
    path = "/api/uploads",
    params(
        ("filename" = String, Query, description = "Original file name")
    ),
    request_body(content = Vec<u8>, description = "Raw drawing bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Stored file reference", body = ApiResponse<UploadData>),
        (status = 400, description = "Empty or oversized body")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> AppResult<Json<ApiResponse<UploadData>>> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty upload".into()));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest("Upload too large".into()));
    }

    let filename = sanitize_filename(&query.filename);
    if filename.is_empty() {
        return Err(AppError::BadRequest("Invalid filename".into()));
    }

    let relative = format!("{}/{}-{}", user.user_id, Uuid::new_v4().simple(), filename);
    let target = state.upload_dir.join(&relative);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(anyhow::Error::from)?;
    }
    tokio::fs::write(&target, &body)
        .await
        .map_err(anyhow::Error::from)?;

    tracing::debug!(user_id = %user.user_id, path = %relative, bytes = body.len(), "upload stored");

    let data = UploadData {
        url: format!("/uploads/{relative}"),
        storage_path: relative,
        bytes: body.len(),
    };
    Ok(Json(ApiResponse::success(
        "Uploaded",
        data,
        Some(Meta::empty()),
    )))
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(128)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_is_reduced_to_safe_characters() {
        assert_eq!(sanitize_filename("dino drawing (1).png"), "dinodrawing1.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("ok-file_2.webp"), "ok-file_2.webp");
        assert_eq!(sanitize_filename("日本語"), "");
    }
}

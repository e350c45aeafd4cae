use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::extract_archive_upload;
use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use rescale_core::AppError;
use rescale_services::{ArchiveFormat, DeliveryStream};
use serde::Deserialize;
use std::sync::Arc;

pub const ITEMS_SUCCEEDED_HEADER: &str = "X-Items-Succeeded";
pub const ITEMS_SKIPPED_HEADER: &str = "X-Items-Skipped";
pub const ITEMS_FAILED_HEADER: &str = "X-Items-Failed";

#[derive(Debug, Default, Deserialize)]
pub struct UpscaleQuery {
    /// Output container, `zip` (default) or `tar`
    pub format: Option<String>,
}

#[utoipa::path(
    post,
    path = "/upscale",
    tag = "upscale",
    params(
        ("format" = Option<String>, Query, description = "Output archive format: 'zip' (default) or 'tar'")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Field 'file' holding a ZIP archive of images"),
    responses(
        (status = 200, description = "Archive of upscaled images, streamed as an attachment"),
        (status = 400, description = "No archive supplied or empty archive field", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size ceiling", body = ErrorResponse),
        (status = 422, description = "Uploaded archive is corrupt or exceeds extraction limits", body = ErrorResponse),
        (status = 500, description = "Output archive could not be built", body = ErrorResponse),
        (status = 507, description = "Scratch space could not be allocated", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query, multipart), fields(operation = "upscale"))]
pub async fn upscale_archive(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpscaleQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, HttpAppError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ArchiveFormat>()?,
        None => ArchiveFormat::default(),
    };

    let upload = extract_archive_upload(multipart?).await?;
    tracing::info!(
        file_name = upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload_bytes = upload.data.len(),
        "Archive received"
    );

    let completed = state.pipeline.run(upload.data, format).await?;

    let download_name = completed.download_name();
    let content_type = completed.content_type();
    let content_length = completed.archive.size_bytes;
    let summary = completed.summary;

    let stream = DeliveryStream::open(completed).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download_name),
        )
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
        .header(ITEMS_SUCCEEDED_HEADER, summary.succeeded)
        .header(ITEMS_SKIPPED_HEADER, summary.skipped)
        .header(ITEMS_FAILED_HEADER, summary.failed)
        .body(Body::from_stream(stream))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build archive response");
            HttpAppError(AppError::Internal(format!(
                "Failed to build response: {}",
                e
            )))
        })
}

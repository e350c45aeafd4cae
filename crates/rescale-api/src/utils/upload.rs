//! Multipart intake of the uploaded archive.

use crate::error::HttpAppError;
use axum::extract::Multipart;
use bytes::Bytes;
use rescale_core::AppError;

/// Name of the multipart field carrying the archive
pub const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub struct ArchiveUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
}

/// Read the single `file` field of the form.
///
/// Other fields are drained and ignored. A missing, repeated or empty `file`
/// field is a bad request; no workspace exists yet at this point.
pub async fn extract_archive_upload(
    mut multipart: Multipart,
) -> Result<ArchiveUpload, HttpAppError> {
    let mut upload: Option<ArchiveUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        if upload.is_some() {
            return Err(AppError::BadRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            )
            .into());
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty());
        let data = field.bytes().await?;

        upload = Some(ArchiveUpload { data, file_name });
    }

    let upload = upload
        .ok_or_else(|| AppError::BadRequest("No file part in the request".to_string()))?;

    if upload.data.is_empty() {
        return Err(AppError::BadRequest(
            "No selected file: the uploaded file is empty".to_string(),
        )
        .into());
    }

    Ok(upload)
}

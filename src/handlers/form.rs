// Form data processing for Emotion API
//
// This module extracts the uploaded audio file from the multipart form of
// `POST /predict/audio`. The file is stored under a unique folder with the
// client's extension, and the returned guard removes that folder when dropped.

use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use std::path::Path;

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::file_utils::{generate_unique_upload_paths, save_file_data, UploadGuard};
use crate::metrics::Metrics;

/// Extension of the client's filename, lowercased, or empty
fn upload_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

/// Extract and persist the `file` field of an audio upload
///
/// # Errors
///
/// * `NoAudioFile` if the form has no `file` field, or one with neither a
///   filename nor content
/// * `FileTooLarge` if the upload exceeds `max_file_size`
/// * `FormError` if the multipart stream is malformed
pub async fn extract_audio_upload(
    mut form: Multipart,
    config: &HandlerConfig,
    metrics: &Metrics,
) -> Result<UploadGuard, HandlerError> {
    let mut upload: Option<UploadGuard> = None;

    // Ensure the temp directory exists
    config.ensure_temp_dir().map_err(|e| {
        error!("Failed to create main tmp directory: {}", e);
        HandlerError::FileError(e)
    })?;

    loop {
        let mut field = match form.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(HandlerError::form_error(e.to_string())),
        };

        let content_disposition = field.content_disposition();
        let field_name = content_disposition
            .and_then(|cd| cd.get_name().map(|name| name.to_string()))
            .unwrap_or_default();

        if field_name != "file" || upload.is_some() {
            // Skip unknown fields
            while field.next().await.is_some() {}
            continue;
        }

        let filename = content_disposition
            .and_then(|cd| cd.get_filename())
            .map(|name| name.to_string());
        let extension = upload_extension(filename.as_deref());
        let paths = generate_unique_upload_paths(&config.temp_dir, "upload", &extension)
            .map_err(|e| {
                error!("Failed to create unique directory: {}", e);
                HandlerError::FileError(e)
            })?;

        // From here on the folder is removed on every exit path
        let guard = UploadGuard::new(paths);

        let mut total_size = 0;
        let mut file_data = Vec::new();

        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| {
                HandlerError::form_error(format!("Error processing file upload: {}", e))
            })?;

            total_size += data.len();
            if total_size > config.max_file_size {
                return Err(HandlerError::FileTooLarge(total_size, config.max_file_size));
            }

            file_data.extend_from_slice(&data);
        }

        // A field without a filename or content means nothing was selected.
        // A named but empty file is kept and fails audio validation.
        if file_data.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
            return Err(HandlerError::NoAudioFile);
        }

        save_file_data(&file_data, guard.audio_file()).map_err(HandlerError::FileError)?;
        metrics.record_file_size(total_size as f64).await;

        info!(
            "Saved audio upload {} ({} bytes)",
            guard.paths().id,
            total_size
        );
        upload = Some(guard);
    }

    upload.ok_or(HandlerError::NoAudioFile)
}

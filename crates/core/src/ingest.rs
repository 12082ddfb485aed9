use std::path::Path;

use tokio::fs;

use crate::{
    error::{KonspektError, Result},
    types::EncodedMedia,
};

/// Resolve the content type of a lecture recording from its extension
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let content_type = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "opus" => "audio/opus",
        "weba" => "audio/webm",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mpeg" | "mpg" => "video/mpeg",
        _ => return None,
    };
    Some(content_type)
}

/// Read a media file fully into memory.
///
/// Fails before any pipeline work starts if the file cannot be read, is empty,
/// or has no recognised content type.
pub async fn ingest(path: &Path) -> Result<EncodedMedia> {
    let read_error = |reason: String| KonspektError::Read {
        path: path.to_path_buf(),
        reason,
    };

    let content_type =
        content_type_for(path).ok_or_else(|| read_error("unsupported media type".to_string()))?;

    let payload = fs::read(path).await.map_err(|e| read_error(e.to_string()))?;
    if payload.is_empty() {
        return Err(read_error("file is empty".to_string()));
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    tracing::debug!(%filename, content_type, bytes = payload.len(), "media ingested");

    Ok(EncodedMedia {
        filename,
        payload,
        content_type: content_type.to_string(),
    })
}

//! Chat stickers: image files placed in the `stickers/` directory of the
//! upload root.

use std::path::Path;
use tokio::fs;

use crate::models::site::Sticker;
use crate::services::file_storage::UploadStore;
use crate::utils::error::{AppError, AppResult};

pub const STICKER_DIR: &str = "stickers";

/// Image content type for a servable sticker file name, or `None` when the
/// name could escape the sticker directory or is not an image.
fn sticker_content_type(file_name: &str) -> Option<String> {
    let plain = !file_name.is_empty()
        && !file_name.starts_with('.')
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !plain {
        return None;
    }

    let mime = mime_guess::from_path(file_name).first()?;
    (mime.type_() == mime::IMAGE).then(|| mime.to_string())
}

/// Stickers sorted by name. A missing directory means no stickers.
pub async fn list_stickers(store: &UploadStore) -> AppResult<Vec<Sticker>> {
    let dir = store.root().join(STICKER_DIR);
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AppError::Storage(format!("Failed to read {:?}: {}", dir, e)));
        }
    };

    let mut stickers = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to read {:?}: {}", dir, e)))?
    {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !is_file || sticker_content_type(file_name).is_none() {
            continue;
        }

        let name = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
            .to_string();
        stickers.push(Sticker {
            name,
            url: format!("/{}/{}", STICKER_DIR, file_name),
        });
    }

    stickers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.url.cmp(&b.url)));
    Ok(stickers)
}

/// Opens a sticker by file name, returning the handle and its content type.
pub async fn open_sticker(store: &UploadStore, file_name: &str) -> AppResult<(fs::File, String)> {
    let not_found = || AppError::NotFound(format!("Sticker '{}' not found", file_name));
    let content_type = sticker_content_type(file_name).ok_or_else(not_found)?;

    let path = store.root().join(STICKER_DIR).join(file_name);
    let handle = fs::File::open(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            not_found()
        } else {
            AppError::Storage(format!("Failed to open {:?}: {}", path, e))
        }
    })?;

    if !handle.metadata().await.map(|m| m.is_file()).unwrap_or(false) {
        return Err(not_found());
    }
    Ok((handle, content_type))
}

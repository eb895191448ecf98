use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use std::collections::HashMap;

use crate::services::file_storage::{StagedUpload, UploadStore};
use crate::utils::error::{AppError, AppResult};

const MAX_TEXT_FIELD_BYTES: usize = 4 * 1024;

/// A parsed multipart form: at most one streamed file plus small text fields.
pub struct UploadForm {
    pub staged: Option<StagedUpload>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_file(&mut self) -> AppResult<StagedUpload> {
        self.staged
            .take()
            .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", e))
}

/// Reads a small text part, giving up as soon as it passes the size cap.
async fn read_text_field(mut field: Field<'_>, name: &str) -> AppResult<String> {
    let mut value = Vec::new();

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if value.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::Validation(format!("Field '{}' is too long", name)));
        }
        value.extend_from_slice(&chunk);
    }

    String::from_utf8(value)
        .map_err(|_| AppError::Validation(format!("Field '{}' is not valid UTF-8", name)))
}

/// Reads a multipart body, streaming the part named by one of `file_fields`
/// straight into the upload store. Text parts may arrive before or after the file.
pub async fn read_upload_form(
    uploads: &UploadStore,
    mut multipart: Multipart,
    file_fields: &[&str],
) -> AppResult<UploadForm> {
    let mut form = UploadForm {
        staged: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if file_fields.contains(&name.as_str()) {
            if form.staged.is_some() {
                return Err(AppError::BadRequest(
                    "Only one file may be uploaded per request".to_string(),
                ));
            }
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            form.staged = Some(
                uploads
                    .stage(&original_name, content_type.as_deref(), field)
                    .await?,
            );
        } else if !name.is_empty() {
            let value = read_text_field(field, &name).await?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// Parses an optional numeric form field; blank means absent.
pub fn parse_price_field(raw: Option<&str>) -> AppResult<Option<f64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Invalid price: {}", value))),
    }
}

/// Quotes a file name for a Content-Disposition header.
pub fn attachment_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

//! Upload ledger: streams uploads to disk, files them under a
//! content-addressed path and records them in the `files` table.
//!
//! An upload is a two-resource operation (filesystem, then database). Each
//! on-disk artifact is held by a [`DiskGuard`] that deletes it on drop until
//! the step that makes it permanent succeeds, so any early return, error or
//! cancelled request leaves no orphan behind.

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use sqlx::Row;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::database::DbPool;
use crate::middleware::auth::AuthUser;
use crate::models::file::{Category, FileRecord};
use crate::models::user::now_timestamp;
use crate::utils::crypto::ContentHasher;
use crate::utils::error::{AppError, AppResult, is_unique_violation};
use crate::utils::permissions::require_owner_or_admin;

pub const INCOMING_DIR: &str = ".incoming";
pub const AVATAR_DIR: &str = "avatars";

/// Removes a file on drop unless disarmed.
struct DiskGuard {
    path: PathBuf,
    armed: bool,
}

impl DiskGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DiskGuard {
    fn drop(&mut self) {
        if self.armed {
            match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!("Discarded {:?}", self.path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to discard {:?}: {}", self.path, e),
            }
        }
    }
}

/// A fully received upload sitting in the incoming area, not yet filed.
pub struct StagedUpload {
    guard: DiskGuard,
    pub original_name: String,
    pub content_type: String,
    pub content_hash: String,
    pub size: u64,
}

impl StagedUpload {
    pub fn temp_path(&self) -> &Path {
        &self.guard.path
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub category: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub category: Option<Category>,
    pub owner_id: Option<i64>,
    pub include_blocked: bool,
}

/// Local upload directory with a per-upload size limit.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: u64,
}

/// Empty or absent means `general`; anything else must be a known category.
pub fn resolve_category(raw: Option<&str>) -> AppResult<Category> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Category::General),
        Some(name) => {
            Category::parse(name).ok_or_else(|| AppError::InvalidCategory(name.to_string()))
        }
    }
}

pub fn validate_price(price: Option<f64>) -> AppResult<f64> {
    let price = price.unwrap_or(0.0);
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "Price must be a non-negative number".to_string(),
        ));
    }
    Ok(price)
}

/// Lower-cased extension of the original name, if it is short and alphanumeric.
fn safe_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn content_path(namespace: &str, staged: &StagedUpload) -> String {
    match safe_extension(&staged.original_name) {
        Some(ext) => format!("{}/{}.{}", namespace, staged.content_hash, ext),
        None => format!("{}/{}", namespace, staged.content_hash),
    }
}

fn display_name(original_name: &str) -> String {
    let name = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.chars().take(255).collect()
    }
}

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> AppError {
    AppError::Storage(format!("Failed to {} {:?}: {}", action, path, e))
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Absolute location of a stored relative path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    /// Streams an upload into the incoming area, hashing as it goes.
    ///
    /// Exceeding the size limit or a failing stream (e.g. the client went
    /// away) discards the partial file.
    pub async fn stage<S, E>(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        stream: S,
    ) -> AppResult<StagedUpload>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let incoming = self.root.join(INCOMING_DIR);
        fs::create_dir_all(&incoming)
            .await
            .map_err(|e| storage_err("create", &incoming, e))?;

        let temp_path = incoming.join(format!("{}.part", uuid::Uuid::new_v4()));
        let guard = DiskGuard::new(temp_path.clone());

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| storage_err("create", &temp_path, e))?;

        let mut hasher = ContentHasher::new();
        let mut stream = std::pin::pin!(stream);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::BadRequest(format!("Upload stream interrupted: {}", e)))?;

            if hasher.len() + chunk.len() as u64 > self.max_bytes {
                tracing::debug!(
                    "Upload {} rejected: exceeds {} bytes",
                    original_name,
                    self.max_bytes
                );
                return Err(AppError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }

            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| storage_err("write", &temp_path, e))?;
        }

        file.flush()
            .await
            .map_err(|e| storage_err("flush", &temp_path, e))?;
        drop(file);

        if hasher.is_empty() {
            return Err(AppError::Validation("File is empty".to_string()));
        }

        let content_type = content_type
            .map(|ct| ct.to_string())
            .filter(|ct| !ct.is_empty() && ct != mime::APPLICATION_OCTET_STREAM.as_ref())
            .unwrap_or_else(|| {
                mime_guess::from_path(original_name)
                    .first_or_octet_stream()
                    .to_string()
            });

        let size = hasher.len();
        Ok(StagedUpload {
            guard,
            original_name: display_name(original_name),
            content_type,
            content_hash: hasher.finish(),
            size,
        })
    }

    /// Moves a staged upload to `relative`. The returned guard still owns the
    /// placed file and removes it on drop unless disarmed. A file that was
    /// already there is left alone on compensation.
    async fn place(&self, mut staged: StagedUpload, relative: &str) -> AppResult<DiskGuard> {
        let final_path = self.resolve(relative);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("create", parent, e))?;
        }

        let existed_before = fs::try_exists(&final_path).await.unwrap_or(false);

        fs::rename(&staged.guard.path, &final_path)
            .await
            .map_err(|e| storage_err("move upload to", &final_path, e))?;
        staged.guard.disarm();

        let mut placed = DiskGuard::new(final_path);
        if existed_before {
            placed.disarm();
        }
        Ok(placed)
    }

    /// Files a staged upload for `owner_id` and records it.
    ///
    /// Identical content in the same category maps to the same path and is
    /// rejected with `DuplicateContent`. If the insert fails the moved file
    /// is removed again.
    pub async fn commit(
        &self,
        pool: &DbPool,
        staged: StagedUpload,
        meta: UploadMeta,
        owner_id: i64,
    ) -> AppResult<FileRecord> {
        let category = resolve_category(meta.category.as_deref())?;
        let price = validate_price(meta.price)?;
        let relative = content_path(category.as_str(), &staged);

        if let Some(existing) = find_by_path(pool, &relative).await? {
            return Err(AppError::DuplicateContent(existing.id));
        }

        let name = staged.original_name.clone();
        let content_hash = staged.content_hash.clone();
        let content_type = staged.content_type.clone();
        let size = staged.size as i64;

        let mut placed = self.place(staged, &relative).await?;

        let inserted = sqlx::query(
            "INSERT INTO files (name, category, path, content_hash, size, content_type, owner_id, price, blocked, missing, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
        )
        .bind(&name)
        .bind(category.as_str())
        .bind(&relative)
        .bind(&content_hash)
        .bind(size)
        .bind(&content_type)
        .bind(owner_id)
        .bind(price)
        .bind(now_timestamp())
        .execute(pool.as_ref())
        .await;

        let file_id = match inserted {
            Ok(done) => done.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                // A concurrent upload of the same content won; the file on
                // disk is now referenced by its record.
                placed.disarm();
                let existing = find_by_path(pool, &relative).await?;
                return Err(match existing {
                    Some(file) => AppError::DuplicateContent(file.id),
                    None => AppError::Database(e),
                });
            }
            Err(e) => {
                tracing::error!("Failed to record upload {}; removing stored file", relative);
                return Err(e.into());
            }
        };
        placed.disarm();

        tracing::info!(
            "File stored: id={}, name={}, path={}, size={} bytes, owner={}, price={}",
            file_id,
            name,
            relative,
            size,
            owner_id,
            price
        );

        get_file(pool, file_id).await
    }

    /// Stage and commit in one call.
    pub async fn store<S, E>(
        &self,
        pool: &DbPool,
        original_name: &str,
        content_type: Option<&str>,
        stream: S,
        meta: UploadMeta,
        owner_id: i64,
    ) -> AppResult<FileRecord>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let staged = self.stage(original_name, content_type, stream).await?;
        self.commit(pool, staged, meta, owner_id).await
    }

    /// Files a staged image as the user's avatar and returns its path.
    pub async fn commit_avatar(
        &self,
        pool: &DbPool,
        staged: StagedUpload,
        user_id: i64,
    ) -> AppResult<String> {
        if !staged.content_type.starts_with("image/") {
            return Err(AppError::Validation(format!(
                "Avatar must be an image, got {}",
                staged.content_type
            )));
        }

        let previous: Option<String> = sqlx::query_scalar("SELECT avatar FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let relative = content_path(AVATAR_DIR, &staged);
        let mut placed = self.place(staged, &relative).await?;

        let updated = sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
            .bind(&relative)
            .bind(user_id)
            .execute(pool.as_ref())
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        placed.disarm();

        tracing::info!("Avatar updated for user {}: {}", user_id, relative);

        if let Some(old) = previous.filter(|old| *old != relative) {
            self.release_avatar(pool, &old).await;
        }
        Ok(relative)
    }

    /// Removes a replaced avatar once no user points at it. Avatars are
    /// content-addressed, so two users may share one file.
    async fn release_avatar(&self, pool: &DbPool, relative: &str) {
        let still_used: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE avatar = ?")
                .bind(relative)
                .fetch_one(pool.as_ref())
                .await;

        match still_used {
            Ok(0) => {
                let path = self.resolve(relative);
                match fs::remove_file(&path).await {
                    Ok(()) => tracing::debug!("Removed replaced avatar {:?}", path),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!("Failed to remove replaced avatar {:?}: {}", path, e),
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not check avatar {} references: {}", relative, e),
        }
    }

    /// Deletes a file as `requester`: owner or admin only.
    ///
    /// The physical file goes first, then the record. If the record cannot
    /// be deleted it is flagged `missing` so the inconsistency stays visible.
    pub async fn delete_file(&self, pool: &DbPool, file_id: i64, requester: &AuthUser) -> AppResult<()> {
        let file = get_file(pool, file_id).await?;
        require_owner_or_admin(requester, file.owner_id)?;

        let path = self.resolve(&file.path);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("File {} already missing from disk: {:?}", file_id, path);
            }
            Err(e) => return Err(storage_err("remove", &path, e)),
        }

        let deleted = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(file_id)
            .execute(pool.as_ref())
            .await;

        if let Err(e) = deleted {
            tracing::error!(
                "File {} removed from disk but its record could not be deleted: {}",
                file_id,
                e
            );
            if let Err(flag_err) = sqlx::query("UPDATE files SET missing = 1 WHERE id = ?")
                .bind(file_id)
                .execute(pool.as_ref())
                .await
            {
                tracing::error!("Failed to flag file {} as missing: {}", file_id, flag_err);
            }
            return Err(AppError::Storage(format!(
                "File {} was removed from disk but its record remains",
                file_id
            )));
        }

        tracing::info!(
            "File deleted: id={}, path={}, by user {}",
            file_id,
            file.path,
            requester.id
        );
        Ok(())
    }

    pub async fn open(&self, file: &FileRecord) -> AppResult<fs::File> {
        let path = self.resolve(&file.path);
        fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tracing::error!("File {} missing on disk: {:?}", file.id, path);
                AppError::NotFound("File not found on disk".to_string())
            } else {
                storage_err("open", &path, e)
            }
        })
    }
}

async fn find_by_path(pool: &DbPool, relative: &str) -> AppResult<Option<FileRecord>> {
    let file = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE path = ?")
        .bind(relative)
        .fetch_optional(pool.as_ref())
        .await?;
    Ok(file)
}

pub async fn get_file(pool: &DbPool, file_id: i64) -> AppResult<FileRecord> {
    sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
        .bind(file_id)
        .fetch_optional(pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))
}

/// Like [`get_file`] but blocked files are hidden from everyone except
/// their owner and admins.
pub async fn get_visible_file(
    pool: &DbPool,
    file_id: i64,
    viewer: Option<&AuthUser>,
) -> AppResult<FileRecord> {
    let file = get_file(pool, file_id).await?;
    if file.is_blocked() {
        let privileged = viewer.is_some_and(|v| {
            crate::utils::permissions::authorize_owner_or_admin(v, file.owner_id).is_allowed()
        });
        if !privileged {
            return Err(AppError::NotFound("File not found".to_string()));
        }
    }
    Ok(file)
}

pub async fn list_files(pool: &DbPool, filter: &FileFilter) -> AppResult<Vec<FileRecord>> {
    let files = sqlx::query_as::<_, FileRecord>(
        "SELECT * FROM files
         WHERE (? IS NULL OR category = ?)
           AND (? IS NULL OR owner_id = ?)
           AND (? = 1 OR blocked = 0)
         ORDER BY created_at DESC, id DESC",
    )
    .bind(filter.category.map(|c| c.as_str()))
    .bind(filter.category.map(|c| c.as_str()))
    .bind(filter.owner_id)
    .bind(filter.owner_id)
    .bind(filter.include_blocked as i64)
    .fetch_all(pool.as_ref())
    .await?;

    Ok(files)
}

pub async fn set_blocked(pool: &DbPool, file_id: i64, blocked: bool) -> AppResult<()> {
    let result = sqlx::query("UPDATE files SET blocked = ? WHERE id = ?")
        .bind(blocked as i64)
        .bind(file_id)
        .execute(pool.as_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    tracing::info!("File {} blocked={}", file_id, blocked);
    Ok(())
}

pub async fn count_files(pool: &DbPool) -> AppResult<i64> {
    let count = sqlx::query("SELECT COUNT(*) as count FROM files")
        .fetch_one(pool.as_ref())
        .await?
        .get::<i64, _>("count");
    Ok(count)
}

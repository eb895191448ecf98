use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;

use crate::services::file_storage::{INCOMING_DIR, UploadStore};

const STALE_PARTIAL_AGE: Duration = Duration::from_secs(3600);

#[derive(FromRow)]
struct StoredFile {
    id: i64,
    path: String,
    missing: i64,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub newly_missing: usize,
    pub recovered: usize,
    pub stale_partials_removed: usize,
}

/// Compares file records against the upload directory. Records whose file
/// vanished are flagged `missing` (and unflagged if it comes back); upload
/// partials abandoned in the incoming area are removed.
pub async fn reconcile_uploads(db: &SqlitePool, store: &UploadStore) -> anyhow::Result<ReconcileReport> {
    tracing::info!("Starting upload reconciliation at {}", Utc::now().to_rfc3339());

    let mut report = ReconcileReport::default();
    let files = sqlx::query_as::<_, StoredFile>("SELECT id, path, missing FROM files")
        .fetch_all(db)
        .await?;

    for file in files {
        let on_disk = fs::try_exists(store.resolve(&file.path)).await.unwrap_or(false);

        match (on_disk, file.missing != 0) {
            (false, false) => {
                tracing::warn!("File {} has no data on disk at {}", file.id, file.path);
                sqlx::query("UPDATE files SET missing = 1 WHERE id = ?")
                    .bind(file.id)
                    .execute(db)
                    .await?;
                report.newly_missing += 1;
            }
            (true, true) => {
                tracing::info!("File {} is back on disk at {}", file.id, file.path);
                sqlx::query("UPDATE files SET missing = 0 WHERE id = ?")
                    .bind(file.id)
                    .execute(db)
                    .await?;
                report.recovered += 1;
            }
            _ => {}
        }
    }

    report.stale_partials_removed = remove_stale_partials(store, STALE_PARTIAL_AGE).await?;

    tracing::info!(
        "Reconciliation completed: {} newly missing, {} recovered, {} stale partials removed",
        report.newly_missing,
        report.recovered,
        report.stale_partials_removed
    );
    Ok(report)
}

async fn remove_stale_partials(store: &UploadStore, max_age: Duration) -> anyhow::Result<usize> {
    let incoming = store.root().join(INCOMING_DIR);
    let mut entries = match fs::read_dir(&incoming).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let modified = entry.metadata().await?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();

        if age >= max_age {
            match fs::remove_file(entry.path()).await {
                Ok(_) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove stale partial {:?}: {}", entry.path(), e),
            }
        }
    }

    Ok(removed)
}

pub fn start_reconcile_task(db: Arc<SqlitePool>, store: UploadStore, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            if let Err(e) = reconcile_uploads(db.as_ref(), &store).await {
                tracing::error!("Upload reconciliation failed: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::services::credentials::create_user;
    use crate::services::file_storage::UploadMeta;
    use axum::body::Bytes;
    use futures_util::stream;

    #[tokio::test]
    async fn test_flags_and_recovers_missing_files() {
        let pool = create_memory_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024);
        let owner = create_user(&pool, "o@example.com", "owner", "d").await.unwrap();

        let file = store
            .store(
                &pool,
                "a.txt",
                None,
                stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"abc"))]),
                UploadMeta::default(),
                owner,
            )
            .await
            .unwrap();

        let path = store.resolve(&file.path);
        std::fs::rename(&path, dir.path().join("moved")).unwrap();

        let report = reconcile_uploads(pool.as_ref(), &store).await.unwrap();
        assert_eq!(report.newly_missing, 1);

        std::fs::rename(dir.path().join("moved"), &path).unwrap();
        let report = reconcile_uploads(pool.as_ref(), &store).await.unwrap();
        assert_eq!(report.recovered, 1);
        assert_eq!(report.newly_missing, 0);
    }

    #[tokio::test]
    async fn test_removes_only_stale_partials() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), 1024);
        let incoming = dir.path().join(INCOMING_DIR);
        std::fs::create_dir_all(&incoming).unwrap();
        std::fs::write(incoming.join("x.part"), b"partial").unwrap();

        assert_eq!(
            remove_stale_partials(&store, Duration::from_secs(3600)).await.unwrap(),
            0
        );
        assert_eq!(remove_stale_partials(&store, Duration::ZERO).await.unwrap(), 1);
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// Relative to the upload root, e.g. `images/<sha256>.png`.
    pub path: String,
    pub content_hash: String,
    pub size: i64,
    pub content_type: String,
    pub owner_id: i64,
    pub price: f64,
    pub blocked: i64,
    pub missing: i64,
    pub created_at: String,
}

impl FileRecord {
    pub fn is_free(&self) -> bool {
        self.price <= 0.0
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Images,
    Books,
    Games,
    Movies,
    Music,
    Apps,
    Tools,
    General,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Images,
        Category::Books,
        Category::Games,
        Category::Movies,
        Category::Music,
        Category::Apps,
        Category::Tools,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Books => "books",
            Category::Games => "games",
            Category::Movies => "movies",
            Category::Music => "music",
            Category::Apps => "apps",
            Category::Tools => "tools",
            Category::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub path: String,
    pub size: i64,
    pub content_type: String,
    pub owner_id: i64,
    pub price: f64,
    pub blocked: bool,
    pub created_at: String,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            name: file.name,
            category: file.category,
            path: file.path,
            size: file.size,
            content_type: file.content_type,
            owner_id: file.owner_id,
            price: file.price,
            blocked: file.blocked == 1,
            created_at: file.created_at,
        }
    }
}

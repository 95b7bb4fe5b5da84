use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct AppListItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub likes: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct AppDetails {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub code: String,
    pub is_public: bool,
    pub likes: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

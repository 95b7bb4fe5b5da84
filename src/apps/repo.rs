use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedApp {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub code: String,
    pub is_public: bool,
    pub likes: i32,
    pub created_at: OffsetDateTime,
}

impl GeneratedApp {
    /// Insert a freshly generated app. Rows are never updated afterwards.
    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        name: &str,
        description: &str,
        prompt: &str,
        code: &str,
        is_public: bool,
    ) -> anyhow::Result<GeneratedApp> {
        let app = sqlx::query_as::<_, GeneratedApp>(
            r#"
            INSERT INTO apps (id, user_id, name, description, prompt, code, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, name, description, prompt, code, is_public, likes, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(prompt)
        .bind(code)
        .bind(is_public)
        .fetch_one(db)
        .await?;
        Ok(app)
    }

    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<GeneratedApp>> {
        let rows = sqlx::query_as::<_, GeneratedApp>(
            r#"
            SELECT id, user_id, name, description, prompt, code, is_public, likes, created_at
            FROM apps
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_public(
        db: &PgPool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<GeneratedApp>> {
        let rows = sqlx::query_as::<_, GeneratedApp>(
            r#"
            SELECT id, user_id, name, description, prompt, code, is_public, likes, created_at
            FROM apps
            WHERE is_public
            ORDER BY likes DESC, created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Fetch a single app visible to the caller: their own, or a public one.
    pub async fn get_accessible(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<GeneratedApp>> {
        let app = sqlx::query_as::<_, GeneratedApp>(
            r#"
            SELECT id, user_id, name, description, prompt, code, is_public, likes, created_at
            FROM apps
            WHERE id = $1 AND (user_id = $2 OR is_public)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(app)
    }
}

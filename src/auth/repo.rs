use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub credits: i32,
    pub is_pro: bool,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, credits, is_pro, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by id.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password_hash, credits, is_pro, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. Credits default to 10.
    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, username, password_hash, credits, is_pro, created_at
            "#,
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Admission check and deduction in one statement: pro rows pass through
    /// unchanged, other rows must hold a positive balance. Atomic per row;
    /// two concurrent requests cannot both spend the last credit. Returns
    /// the remaining balance, or `None` when the user is out of credits.
    pub async fn try_deduct_credit(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<i32>> {
        let credits = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET credits = CASE WHEN is_pro THEN credits ELSE credits - 1 END
            WHERE id = $1 AND (is_pro OR credits > 0)
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(credits)
    }
}

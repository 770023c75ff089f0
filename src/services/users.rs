use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{CreateUserRequest, User};

pub struct UsersService;

impl UsersService {
    /// Creates a new directory user
    pub async fn create_user(pool: &PgPool, req: &CreateUserRequest) -> AppResult<User> {
        if req.email.trim().is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, display_name, roles, telegram_chat_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, display_name, roles, telegram_chat_id, is_active, created_at
            "#,
        )
        .bind(req.email.trim())
        .bind(&req.display_name)
        .bind(&req.roles)
        .bind(&req.telegram_chat_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Email already exists".to_string())
            }
            _ => AppError::Internal(format!("Failed to create user: {}", e)),
        })?;

        Ok(user)
    }

    /// Gets a user by ID
    pub async fn get_by_id(pool: &PgPool, user_id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, roles, telegram_chat_id, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists ids of active users holding a role, lowest id first
    pub async fn list_ids_by_role(pool: &PgPool, role: &str) -> AppResult<Vec<i32>> {
        let ids: Vec<(i32,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM users
            WHERE $1 = ANY(roles) AND is_active = TRUE
            ORDER BY id
            "#,
        )
        .bind(role)
        .fetch_all(pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Deactivates a user so role expansion no longer reaches them
    pub async fn deactivate(pool: &PgPool, user_id: i32) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        Ok(())
    }
}

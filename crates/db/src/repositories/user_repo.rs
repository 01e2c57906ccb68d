use piecework_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::user::{CreateUser, User};

/// Column list for `users` queries.
const COLUMNS: &str = "id, username, full_name, is_admin, active, created_at";

/// CRUD for worker identities.
pub struct UserRepo;

impl UserRepo {
    pub async fn create(
        ex: impl PgExecutor<'_>,
        input: &CreateUser,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (username, full_name, is_admin) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.full_name)
            .bind(input.is_admin)
            .fetch_one(ex)
            .await
    }

    pub async fn find_by_id(
        ex: impl PgExecutor<'_>,
        user_id: DbId,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(ex)
            .await
    }
}

use sqlx::postgres::PgExecutor;

use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, role_id, created_at";

pub async fn create<'e, E: PgExecutor<'e>>(user: &NewUser, executor: E) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password_hash, role_id) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role_id)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e, E: PgExecutor<'e>>(id: i64, executor: E) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn get_by_email<'e, E: PgExecutor<'e>>(
    email: &str,
    executor: E,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub async fn update<'e, E: PgExecutor<'e>>(
    id: i64,
    name: &str,
    email: &str,
    executor: E,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET name = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(email)
    .fetch_optional(executor)
    .await
}

// enrollments go with the user through ON DELETE CASCADE
pub async fn delete<'e, E: PgExecutor<'e>>(id: i64, executor: E) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;

use crate::models::{InviteCode, InviteStatus, NewInviteCode};

const INVITE_COLUMNS: &str =
    "id, code, inviter_id, invitee_email, status, created_at, expired_at, used_at";

/// Inserts an `active` invite. A clash on `code` yields `Ok(None)` instead of
/// aborting the caller's transaction.
pub async fn create<'e, E: PgExecutor<'e>>(
    invite: &NewInviteCode,
    executor: E,
) -> Result<Option<InviteCode>, sqlx::Error> {
    sqlx::query_as::<_, InviteCode>(&format!(
        "INSERT INTO invite_codes (code, inviter_id, invitee_email, status, created_at, expired_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (code) DO NOTHING
        RETURNING {INVITE_COLUMNS}"
    ))
    .bind(&invite.code)
    .bind(invite.inviter_id)
    .bind(&invite.invitee_email)
    .bind(InviteStatus::Active)
    .bind(invite.created_at)
    .bind(invite.expired_at)
    .fetch_optional(executor)
    .await
}

pub async fn lock_by_code<'e, E: PgExecutor<'e>>(
    code: &str,
    executor: E,
) -> Result<Option<InviteCode>, sqlx::Error> {
    sqlx::query_as::<_, InviteCode>(&format!(
        "SELECT {INVITE_COLUMNS} FROM invite_codes WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(executor)
    .await
}

pub async fn mark_used<'e, E: PgExecutor<'e>>(
    id: i64,
    email: &str,
    used_at: DateTime<Utc>,
    executor: E,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE invite_codes
        SET status = $2, used_at = $3, invitee_email = $4
        WHERE id = $1",
    )
    .bind(id)
    .bind(InviteStatus::Used)
    .bind(used_at)
    .bind(email)
    .execute(executor)
    .await?;
    Ok(res.rows_affected())
}

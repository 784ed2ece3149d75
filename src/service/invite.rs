use chrono::Duration;
use log::{error, info, warn};
use mockable::Clock;
use rand::{rngs::OsRng, Rng};

use crate::{
    db::{Store, StoreError, StoreTx},
    dto::{normalize_email, CreateInviteDto, ManagerRegisterDto},
    errors::{AppError, ConflictKind, ForbiddenKind},
    models::{InviteCode, InviteStatus, NewInviteCode, NewUser, User, ROLE_MANAGER},
};

use super::crypto;

pub const CODE_LEN: usize = 16;
pub const MAX_EXPIRE_HOURS: i64 = 24 * 30;
const MAX_ATTEMPTS: usize = 5;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Creates an active invite and returns its plaintext code.
pub async fn issue<S: Store>(
    inviter_id: i64,
    dto: CreateInviteDto,
    store: &S,
    clock: &dyn Clock,
) -> Result<String, AppError> {
    issue_with(inviter_id, dto, store, clock, generate_code).await
}

async fn issue_with<S, G>(
    inviter_id: i64,
    dto: CreateInviteDto,
    store: &S,
    clock: &dyn Clock,
    mut next_code: G,
) -> Result<String, AppError>
where
    S: Store,
    G: FnMut() -> String,
{
    if !(1..=MAX_EXPIRE_HOURS).contains(&dto.expire_hours) {
        return Err(AppError::validation(format!(
            "expire_hours must be between 1 and {MAX_EXPIRE_HOURS}"
        )));
    }
    let invitee_email = dto
        .invitee_email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    let created_at = clock.utc();
    let expired_at = created_at + Duration::hours(dto.expire_hours);

    for attempt in 1..=MAX_ATTEMPTS {
        let invite = NewInviteCode {
            code: next_code(),
            inviter_id,
            invitee_email: invitee_email.clone(),
            created_at,
            expired_at,
        };
        match store.insert_invite(&invite).await? {
            Some(row) => {
                info!(
                    "user {} issued invite {} expiring at {}",
                    inviter_id, row.id, row.expired_at
                );
                return Ok(row.code);
            }
            None => warn!("invite code collision on attempt {}", attempt),
        }
    }
    error!("could not generate a unique invite code in {} attempts", MAX_ATTEMPTS);
    Err(AppError::InternalError)
}

fn check_redeemable(invite: &InviteCode, email: &str, now: chrono::DateTime<chrono::Utc>) -> Result<(), ForbiddenKind> {
    match invite.status {
        None => return Err(ForbiddenKind::Inactive),
        Some(InviteStatus::Used) => return Err(ForbiddenKind::AlreadyUsed),
        Some(InviteStatus::Active) => {}
    }
    if invite.used_at.is_some() {
        return Err(ForbiddenKind::AlreadyUsed);
    }
    if invite.expired_at <= now {
        return Err(ForbiddenKind::Expired);
    }
    match invite.invitee_email.as_deref() {
        Some(bound) if bound != email => Err(ForbiddenKind::EmailMismatch),
        _ => Ok(()),
    }
}

/// Consumes an invite and creates a manager account in one transaction. The
/// invite row is locked for the whole transaction, so of several concurrent
/// redeemers exactly one commits and the rest see the code as used. Any
/// failure rolls back both the new user and the invite update.
pub async fn redeem<S: Store>(
    dto: ManagerRegisterDto,
    store: &S,
    clock: &dyn Clock,
) -> Result<User, AppError> {
    dto.validate()?;
    let code = dto.invite_code.trim();
    let email = normalize_email(&dto.email);
    let new_user = NewUser {
        name: dto.name.trim().to_string(),
        email: email.clone(),
        password_hash: crypto::hash_password(&dto.password)?,
        role_id: ROLE_MANAGER,
    };

    let mut tx = store.begin().await?;
    let invite = match tx.lock_invite(code).await? {
        Some(invite) => invite,
        None => {
            warn!("redeem attempt with unknown invite code");
            return Err(AppError::InvalidInviteCode);
        }
    };
    let now = clock.utc();
    if let Err(kind) = check_redeemable(&invite, &email, now) {
        warn!("invite {} rejected for {}: {}", invite.id, email, kind);
        return Err(AppError::Forbidden(kind));
    }

    let user = match tx.insert_user(&new_user).await {
        Ok(user) => user,
        Err(StoreError::UniqueViolation(_)) => {
            return Err(AppError::Conflict(ConflictKind::EmailExists));
        }
        Err(err) => return Err(err.into()),
    };
    tx.mark_invite_used(invite.id, &email, now).await?;
    match tx.commit().await {
        Ok(()) => {}
        Err(StoreError::UniqueViolation(_)) => {
            return Err(AppError::Conflict(ConflictKind::EmailExists));
        }
        Err(err) => return Err(err.into()),
    }

    info!("invite {} redeemed by new manager {}", invite.id, user.id);
    Ok(user)
}

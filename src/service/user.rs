use log::{info, warn};

use crate::{
    db::{Store, StoreError},
    dto::{normalize_email, NewUserDto, UpdateProfileDto},
    errors::{AppError, ConflictKind, Missing},
    models::{CourseView, NewUser, Permissions, User, ROLE_STUDENT},
};

use super::{auth::UserAuthData, course, crypto};

pub async fn register_student<S: Store>(dto: NewUserDto, store: &S) -> Result<User, AppError> {
    dto.validate()?;
    let new_user = NewUser {
        name: dto.name.trim().to_string(),
        email: normalize_email(&dto.email),
        password_hash: crypto::hash_password(&dto.password)?,
        role_id: ROLE_STUDENT,
    };
    match store.create_user(&new_user).await {
        Ok(user) => {
            info!("registered student {}", user.id);
            Ok(user)
        }
        Err(StoreError::UniqueViolation(_)) => Err(AppError::Conflict(ConflictKind::EmailExists)),
        Err(err) => Err(err.into()),
    }
}

pub async fn profile<S: Store>(id: i64, store: &S) -> Result<User, AppError> {
    store.find_user(id).await?.ok_or(AppError::NotFound(Missing::User))
}

/// Renames the caller and changes their login email. Tokens already issued
/// keep the old email claim until they expire.
pub async fn update_profile<S: Store>(id: i64, dto: UpdateProfileDto, store: &S) -> Result<User, AppError> {
    dto.validate()?;
    let name = dto.name.trim();
    let email = normalize_email(&dto.email);
    match store.update_user(id, name, &email).await {
        Ok(Some(user)) => {
            info!("user {} updated their profile", id);
            Ok(user)
        }
        Ok(None) => Err(AppError::NotFound(Missing::User)),
        Err(StoreError::UniqueViolation(_)) => Err(AppError::Conflict(ConflictKind::EmailExists)),
        Err(err) => Err(err.into()),
    }
}

/// Users may delete themselves; deleting anyone else needs `MANAGE_USERS`.
pub async fn delete<S: Store>(caller: &UserAuthData, id: i64, store: &S) -> Result<(), AppError> {
    if caller.user_id != id {
        caller.require(Permissions::MANAGE_USERS)?;
    }
    if store.delete_user(id).await? == 0 {
        return Err(AppError::NotFound(Missing::User));
    }
    warn!("user {} deleted by {}", id, caller.user_id);
    Ok(())
}

pub async fn enrolled_courses<S: Store>(student_id: i64, store: &S) -> Result<Vec<CourseView>, AppError> {
    if store.find_user(student_id).await?.is_none() {
        return Err(AppError::NotFound(Missing::Student));
    }
    let courses = store.courses_for_student(student_id).await?;
    course::with_availability(courses, store).await
}

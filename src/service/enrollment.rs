use log::{debug, info};
use mockable::Clock;

use crate::{
    db::{Store, StoreError, StoreTx},
    errors::{AppError, ConflictKind, Missing},
    models::Enrollment,
};

/// Admits `student_id` to `course_id`. The course row stays locked from the
/// duplicate check until commit, so concurrent registrants of one course are
/// admitted one at a time and the registered count never exceeds capacity.
pub async fn register<S: Store>(
    student_id: i64,
    course_id: i64,
    store: &S,
    clock: &dyn Clock,
) -> Result<Enrollment, AppError> {
    if store.find_user(student_id).await?.is_none() {
        return Err(AppError::NotFound(Missing::Student));
    }
    if store.find_course(course_id).await?.is_none() {
        return Err(AppError::NotFound(Missing::Course));
    }

    let mut tx = store.begin().await?;
    // the course may have been deleted since the lookup above
    let course = tx
        .lock_course(course_id)
        .await?
        .ok_or(AppError::NotFound(Missing::Course))?;
    if tx.enrollment_exists(student_id, course_id).await? {
        return Err(AppError::Conflict(ConflictKind::Duplicate));
    }
    let registered = tx.count_registered(course_id).await?;
    if registered >= i64::from(course.capacity) {
        debug!("course {} is full ({}/{})", course_id, registered, course.capacity);
        return Err(AppError::Conflict(ConflictKind::Full));
    }
    let enrollment = tx
        .insert_enrollment(student_id, course_id, clock.utc())
        .await
        .map_err(duplicate_or_internal)?;
    tx.commit().await.map_err(duplicate_or_internal)?;

    info!(
        "student {} registered for course {} ({}/{})",
        student_id,
        course_id,
        registered + 1,
        course.capacity
    );
    Ok(enrollment)
}

fn duplicate_or_internal(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation(_) => AppError::Conflict(ConflictKind::Duplicate),
        other => other.into(),
    }
}

pub async fn drop<S: Store>(student_id: i64, course_id: i64, store: &S) -> Result<(), AppError> {
    if store.delete_enrollment(student_id, course_id).await? == 0 {
        return Err(AppError::NotFound(Missing::Registration));
    }
    info!("student {} dropped course {}", student_id, course_id);
    Ok(())
}

pub async fn list_registrations<S: Store>(course_id: i64, store: &S) -> Result<Vec<Enrollment>, AppError> {
    if store.find_course(course_id).await?.is_none() {
        return Err(AppError::NotFound(Missing::Course));
    }
    Ok(store.enrollments_for_course(course_id).await?)
}

use log::{info, warn};

use crate::{
    db::{Store, StoreTx},
    dto::ClassesPage,
    errors::{AppError, ConflictKind, Missing},
    models::{Course, CourseView, NewCourse},
};

pub const PAGE_SIZE: i64 = 20;

/// Spots left for display. Admission never relies on this value; it recounts
/// under the course lock.
pub fn availability(course: &Course, registered: i64) -> i64 {
    (i64::from(course.capacity) - registered).max(0)
}

pub async fn view<S: Store>(course: Course, store: &S) -> Result<CourseView, AppError> {
    let registered = store.count_registered(course.id).await?;
    Ok(CourseView {
        spot: availability(&course, registered),
        course,
    })
}

pub async fn with_availability<S: Store>(courses: Vec<Course>, store: &S) -> Result<Vec<CourseView>, AppError> {
    let mut views = Vec::with_capacity(courses.len());
    for course in courses {
        views.push(view(course, store).await?);
    }
    Ok(views)
}

pub async fn list_page<S: Store>(page: i64, store: &S) -> Result<ClassesPage, AppError> {
    let page = page.max(1);
    let offset = (page - 1)
        .checked_mul(PAGE_SIZE)
        .ok_or_else(|| AppError::validation("page is out of range"))?;
    let courses = store.list_courses(PAGE_SIZE, offset).await?;
    let total = store.count_courses().await?;
    Ok(ClassesPage {
        page,
        page_size: PAGE_SIZE,
        total,
        classes: with_availability(courses, store).await?,
    })
}

pub async fn get<S: Store>(id: i64, store: &S) -> Result<CourseView, AppError> {
    match store.find_course(id).await? {
        Some(course) => view(course, store).await,
        None => Err(AppError::NotFound(Missing::Course)),
    }
}

pub async fn create<S: Store>(new_course: NewCourse, store: &S) -> Result<Course, AppError> {
    let course = store.create_course(&new_course).await?;
    info!("course {} ({}) created with capacity {}", course.id, course.code, course.capacity);
    Ok(course)
}

/// Holds the course lock while comparing the new capacity with the current
/// registrations, so no registration can slip in between.
pub async fn update<S: Store>(id: i64, new_course: NewCourse, store: &S) -> Result<Course, AppError> {
    let mut tx = store.begin().await?;
    if tx.lock_course(id).await?.is_none() {
        return Err(AppError::NotFound(Missing::Course));
    }
    let registered = tx.count_registered(id).await?;
    if i64::from(new_course.capacity) < registered {
        warn!(
            "refusing to shrink course {} to {} with {} registrations",
            id, new_course.capacity, registered
        );
        return Err(AppError::Conflict(ConflictKind::CapacityBelowRegistrations));
    }
    let course = tx.update_course(id, &new_course).await?;
    tx.commit().await?;
    info!("course {} updated", id);
    Ok(course)
}

pub async fn delete<S: Store>(id: i64, store: &S) -> Result<(), AppError> {
    if store.delete_course(id).await? == 0 {
        return Err(AppError::NotFound(Missing::Course));
    }
    info!("course {} deleted", id);
    Ok(())
}

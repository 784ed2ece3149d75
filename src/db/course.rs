use sqlx::postgres::PgExecutor;

use crate::models::{Course, NewCourse};

const COURSE_COLUMNS: &str =
    "id, name, code, description, start_time, end_time, capacity, duration, category, weekday";

pub async fn create<'e, E: PgExecutor<'e>>(course: &NewCourse, executor: E) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (name, code, description, start_time, end_time, capacity, duration, category, weekday)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COURSE_COLUMNS}"
    ))
    .bind(&course.name)
    .bind(&course.code)
    .bind(&course.description)
    .bind(course.start_time)
    .bind(course.end_time)
    .bind(course.capacity)
    .bind(course.duration)
    .bind(&course.category)
    .bind(&course.weekday)
    .fetch_one(executor)
    .await
}

pub async fn get_by_id<'e, E: PgExecutor<'e>>(id: i64, executor: E) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Row-locks the course for the rest of the surrounding transaction. Every
/// registrant of the same course queues on this lock.
pub async fn lock_by_id<'e, E: PgExecutor<'e>>(id: i64, executor: E) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn get_page<'e, E: PgExecutor<'e>>(
    limit: i64,
    offset: i64,
    executor: E,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses ORDER BY start_time ASC, id ASC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

pub async fn count<'e, E: PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
        .fetch_one(executor)
        .await
}

// /users/{id}/enrollments
pub async fn get_by_student<'e, E: PgExecutor<'e>>(
    student_id: i64,
    executor: E,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT c.id, c.name, c.code, c.description, c.start_time, c.end_time, c.capacity, c.duration, c.category, c.weekday
        FROM courses c
        INNER JOIN enrollments e ON e.course_id = c.id
        WHERE e.student_id = $1 AND e.status = 'registered'
        ORDER BY c.start_time ASC, c.id ASC",
    )
    .bind(student_id)
    .fetch_all(executor)
    .await
}

pub async fn update<'e, E: PgExecutor<'e>>(
    id: i64,
    course: &NewCourse,
    executor: E,
) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses
        SET name = $2, code = $3, description = $4, start_time = $5, end_time = $6,
            capacity = $7, duration = $8, category = $9, weekday = $10
        WHERE id = $1
        RETURNING {COURSE_COLUMNS}"
    ))
    .bind(id)
    .bind(&course.name)
    .bind(&course.code)
    .bind(&course.description)
    .bind(course.start_time)
    .bind(course.end_time)
    .bind(course.capacity)
    .bind(course.duration)
    .bind(&course.category)
    .bind(&course.weekday)
    .fetch_one(executor)
    .await
}

pub async fn delete<'e, E: PgExecutor<'e>>(id: i64, executor: E) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

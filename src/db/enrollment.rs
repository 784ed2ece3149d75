use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;

use crate::models::{Enrollment, EnrollmentStatus};

const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, status, enroll_time";

pub async fn create<'e, E: PgExecutor<'e>>(
    student_id: i64,
    course_id: i64,
    enroll_time: DateTime<Utc>,
    executor: E,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO enrollments (student_id, course_id, status, enroll_time)
        VALUES ($1, $2, $3, $4)
        RETURNING {ENROLLMENT_COLUMNS}"
    ))
    .bind(student_id)
    .bind(course_id)
    .bind(EnrollmentStatus::Registered)
    .bind(enroll_time)
    .fetch_one(executor)
    .await
}

pub async fn exists<'e, E: PgExecutor<'e>>(
    student_id: i64,
    course_id: i64,
    executor: E,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM enrollments WHERE student_id = $1 AND course_id = $2)",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_one(executor)
    .await
}

pub async fn count_registered<'e, E: PgExecutor<'e>>(course_id: i64, executor: E) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE course_id = $1 AND status = $2",
    )
    .bind(course_id)
    .bind(EnrollmentStatus::Registered)
    .fetch_one(executor)
    .await
}

pub async fn get_by_course<'e, E: PgExecutor<'e>>(
    course_id: i64,
    executor: E,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 ORDER BY enroll_time ASC, id ASC"
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await
}

pub async fn delete<'e, E: PgExecutor<'e>>(
    student_id: i64,
    course_id: i64,
    executor: E,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("DELETE FROM enrollments WHERE student_id = $1 AND course_id = $2")
        .bind(student_id)
        .bind(course_id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected())
}

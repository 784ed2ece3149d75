pub mod course;
pub mod enrollment;
pub mod invitations;
#[cfg(test)]
pub mod memory;
pub mod user;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;

use crate::{
    models::{Course, Enrollment, InviteCode, NewCourse, NewInviteCode, NewUser, User},
    PGPool,
};

/// Upper bound on how long a transaction waits for a contended row lock.
const SET_LOCK_TIMEOUT: &str = "SET LOCAL lock_timeout = '5s'";

pub async fn init_db_pool(db_url: &str, max_connections: u32) -> Result<PGPool, sqlx::Error> {
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    info!("connected to postgresql");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database schema is up to date");
    Ok(pool)
}

#[derive(Debug, Display, Error)]
pub enum StoreError {
    #[display(fmt = "unique constraint violated: {}", _0)]
    UniqueViolation(#[error(not(source))] String),

    #[display(fmt = "{}", _0)]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.constraint().unwrap_or("unknown").to_string())
            }
            other => StoreError::Backend(other),
        }
    }
}

/// Access to the relational store outside of an explicit transaction.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Opens a transaction. Row locks taken through the returned handle are
    /// held until it is committed, or released by rollback when it is dropped.
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;
    /// `None` when no user has `id`.
    async fn update_user(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError>;
    async fn delete_user(&self, id: i64) -> Result<u64, StoreError>;

    async fn find_course(&self, id: i64) -> Result<Option<Course>, StoreError>;
    async fn list_courses(&self, limit: i64, offset: i64) -> Result<Vec<Course>, StoreError>;
    async fn count_courses(&self) -> Result<i64, StoreError>;
    async fn courses_for_student(&self, student_id: i64) -> Result<Vec<Course>, StoreError>;
    async fn create_course(&self, course: &NewCourse) -> Result<Course, StoreError>;
    async fn delete_course(&self, id: i64) -> Result<u64, StoreError>;

    async fn count_registered(&self, course_id: i64) -> Result<i64, StoreError>;
    async fn enrollments_for_course(&self, course_id: i64) -> Result<Vec<Enrollment>, StoreError>;
    async fn delete_enrollment(&self, student_id: i64, course_id: i64) -> Result<u64, StoreError>;

    /// Returns `None` when the code is already taken.
    async fn insert_invite(&self, invite: &NewInviteCode) -> Result<Option<InviteCode>, StoreError>;
}

/// A scoped transaction. Every `lock_*` call takes an exclusive row lock.
#[async_trait]
pub trait StoreTx: Send + Sized {
    async fn lock_course(&mut self, id: i64) -> Result<Option<Course>, StoreError>;
    async fn enrollment_exists(&mut self, student_id: i64, course_id: i64) -> Result<bool, StoreError>;
    async fn count_registered(&mut self, course_id: i64) -> Result<i64, StoreError>;
    async fn insert_enrollment(
        &mut self,
        student_id: i64,
        course_id: i64,
        enroll_time: DateTime<Utc>,
    ) -> Result<Enrollment, StoreError>;
    async fn update_course(&mut self, id: i64, course: &NewCourse) -> Result<Course, StoreError>;

    async fn lock_invite(&mut self, code: &str) -> Result<Option<InviteCode>, StoreError>;
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, StoreError>;
    async fn mark_invite_used(
        &mut self,
        id: i64,
        email: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PGPool,
}

impl PgStore {
    pub fn new(pool: PGPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(SET_LOCK_TIMEOUT).execute(&mut *tx).await?;
        Ok(PgTx { tx })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(user::get_by_id(id, &self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(user::get_by_email(email, &self.pool).await?)
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        Ok(user::create(new_user, &self.pool).await?)
    }

    async fn update_user(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError> {
        Ok(user::update(id, name, email, &self.pool).await?)
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        Ok(user::delete(id, &self.pool).await?)
    }

    async fn find_course(&self, id: i64) -> Result<Option<Course>, StoreError> {
        Ok(course::get_by_id(id, &self.pool).await?)
    }

    async fn list_courses(&self, limit: i64, offset: i64) -> Result<Vec<Course>, StoreError> {
        Ok(course::get_page(limit, offset, &self.pool).await?)
    }

    async fn count_courses(&self) -> Result<i64, StoreError> {
        Ok(course::count(&self.pool).await?)
    }

    async fn courses_for_student(&self, student_id: i64) -> Result<Vec<Course>, StoreError> {
        Ok(course::get_by_student(student_id, &self.pool).await?)
    }

    async fn create_course(&self, new_course: &NewCourse) -> Result<Course, StoreError> {
        Ok(course::create(new_course, &self.pool).await?)
    }

    async fn delete_course(&self, id: i64) -> Result<u64, StoreError> {
        Ok(course::delete(id, &self.pool).await?)
    }

    async fn count_registered(&self, course_id: i64) -> Result<i64, StoreError> {
        Ok(enrollment::count_registered(course_id, &self.pool).await?)
    }

    async fn enrollments_for_course(&self, course_id: i64) -> Result<Vec<Enrollment>, StoreError> {
        Ok(enrollment::get_by_course(course_id, &self.pool).await?)
    }

    async fn delete_enrollment(&self, student_id: i64, course_id: i64) -> Result<u64, StoreError> {
        Ok(enrollment::delete(student_id, course_id, &self.pool).await?)
    }

    async fn insert_invite(&self, invite: &NewInviteCode) -> Result<Option<InviteCode>, StoreError> {
        Ok(invitations::create(invite, &self.pool).await?)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_course(&mut self, id: i64) -> Result<Option<Course>, StoreError> {
        Ok(course::lock_by_id(id, &mut *self.tx).await?)
    }

    async fn enrollment_exists(&mut self, student_id: i64, course_id: i64) -> Result<bool, StoreError> {
        Ok(enrollment::exists(student_id, course_id, &mut *self.tx).await?)
    }

    async fn count_registered(&mut self, course_id: i64) -> Result<i64, StoreError> {
        Ok(enrollment::count_registered(course_id, &mut *self.tx).await?)
    }

    async fn insert_enrollment(
        &mut self,
        student_id: i64,
        course_id: i64,
        enroll_time: DateTime<Utc>,
    ) -> Result<Enrollment, StoreError> {
        Ok(enrollment::create(student_id, course_id, enroll_time, &mut *self.tx).await?)
    }

    async fn update_course(&mut self, id: i64, new_course: &NewCourse) -> Result<Course, StoreError> {
        Ok(course::update(id, new_course, &mut *self.tx).await?)
    }

    async fn lock_invite(&mut self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        Ok(invitations::lock_by_code(code, &mut *self.tx).await?)
    }

    async fn insert_user(&mut self, new_user: &NewUser) -> Result<User, StoreError> {
        Ok(user::create(new_user, &mut *self.tx).await?)
    }

    async fn mark_invite_used(
        &mut self,
        id: i64,
        email: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let rows = invitations::mark_used(id, email, used_at, &mut *self.tx).await?;
        if rows != 1 {
            warn!("marking invite {} as used touched {} rows", id, rows);
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit().await?)
    }
}

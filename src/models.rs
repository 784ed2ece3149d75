use bitflags::bitflags;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::prelude::FromRow;

pub const ROLE_STUDENT: i64 = 1;
pub const ROLE_SUPER_MANAGER: i64 = 2;
pub const ROLE_MANAGER: i64 = 3;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        const ENROLL = 1;
        const MANAGE_COURSES = 1 << 1;
        const ISSUE_INVITES = 1 << 2;
        const MANAGE_USERS = 1 << 3;
    }
}

impl Permissions {
    /// Unknown role ids carry no permissions.
    pub fn for_role(role_id: i64) -> Self {
        match role_id {
            ROLE_STUDENT => Permissions::ENROLL,
            ROLE_MANAGER => Permissions::ENROLL | Permissions::MANAGE_COURSES,
            ROLE_SUPER_MANAGER => Permissions::all(),
            _ => Permissions::empty(),
        }
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, serde::Serialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub description: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub duration: i32,
    pub category: String,
    pub weekday: String,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub description: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: i32,
    pub duration: i32,
    pub category: String,
    pub weekday: String,
}

/// A course together with its remaining seats at read time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Course,
    pub spot: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize)]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Registered,
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    pub enroll_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize)]
#[sqlx(type_name = "invite_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Active,
    Used,
}

#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct InviteCode {
    pub id: i64,
    pub code: String,
    pub inviter_id: Option<i64>,
    pub invitee_email: Option<String>,
    pub status: Option<InviteStatus>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewInviteCode {
    pub code: String,
    pub inviter_id: i64,
    pub invitee_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::{
    errors::AppError,
    models::{CourseView, NewCourse},
};

const MIN_PASSWORD_LEN: usize = 6;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn validate_account(name: &str, email: &str, pwd: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if !looks_like_email(&normalize_email(email)) {
        return Err(AppError::validation("a valid email is required"));
    }
    if pwd.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewUserDto {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewUserDto {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_account(&self.name, &self.email, &self.password)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ManagerRegisterDto {
    pub name: String,
    pub email: String,
    pub password: String,
    pub invite_code: String,
}

impl ManagerRegisterDto {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_account(&self.name, &self.email, &self.password)?;
        if self.invite_code.trim().is_empty() {
            return Err(AppError::validation("invite_code is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpdateProfileDto {
    pub name: String,
    pub email: String,
}

impl UpdateProfileDto {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if !looks_like_email(&normalize_email(&self.email)) {
            return Err(AppError::validation("a valid email is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginUserRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub token: String,
    pub role_id: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Claims {
    pub id: i64,
    pub email: String,
    pub role_id: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct EnrollmentRequest {
    pub course_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreateInviteDto {
    #[serde(default)]
    pub invitee_email: Option<String>,
    pub expire_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct InviteCreatedResponse {
    pub message: &'static str,
    pub code: String,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    /// Pages are 1-based; anything missing or below 1 falls back to the first page.
    pub fn page(&self) -> i64 {
        match self.page {
            Some(p) if p > 0 => p,
            _ => 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClassesPage {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub classes: Vec<CourseView>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CourseUpsertDto {
    pub name: String,
    pub course_code: String,
    #[serde(default)]
    pub description: String,
    pub start_time: String,
    pub end_time: String,
    pub capacity: i32,
    #[serde(default)]
    pub duration: i32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub weekday: String,
}

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

impl CourseUpsertDto {
    pub fn into_new_course(self) -> Result<NewCourse, AppError> {
        if self.name.trim().is_empty() || self.course_code.trim().is_empty() {
            return Err(AppError::validation("name and course_code are required"));
        }
        let start_time = parse_time_of_day(&self.start_time).ok_or_else(|| {
            AppError::validation("invalid start_time, expected HH:MM or HH:MM:SS")
        })?;
        let end_time = parse_time_of_day(&self.end_time).ok_or_else(|| {
            AppError::validation("invalid end_time, expected HH:MM or HH:MM:SS")
        })?;
        if self.capacity < 1 {
            return Err(AppError::validation("capacity must be at least 1"));
        }
        if self.duration < 0 {
            return Err(AppError::validation("duration must not be negative"));
        }
        Ok(NewCourse {
            name: self.name,
            code: self.course_code,
            description: self.description,
            start_time,
            end_time,
            capacity: self.capacity,
            duration: self.duration,
            category: self.category,
            weekday: self.weekday,
        })
    }
}

//! In-process `Store` used by the test-suite.
//!
//! Transactions stage their writes and apply them atomically on commit.
//! `lock_*` calls take a per-row async mutex that is held until the
//! transaction is committed or dropped, which mirrors `SELECT ... FOR UPDATE`.
//! Every transactional step yields to the scheduler first so that concurrent
//! tasks genuinely interleave between a check and the write that follows it.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{Store, StoreError, StoreTx};
use crate::models::{
    Course, Enrollment, EnrollmentStatus, InviteCode, InviteStatus, NewCourse, NewInviteCode, NewUser, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Course(i64),
    Invite(i64),
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    courses: BTreeMap<i64, Course>,
    enrollments: BTreeMap<i64, Enrollment>,
    invites: BTreeMap<i64, InviteCode>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn enrolled(&self, student_id: i64, course_id: i64) -> bool {
        self.enrollments
            .values()
            .any(|e| e.student_id == student_id && e.course_id == course_id)
    }

    fn registered_count(&self, course_id: i64) -> i64 {
        self.enrollments
            .values()
            .filter(|e| e.course_id == course_id && e.status == EnrollmentStatus::Registered)
            .count() as i64
    }
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowLock<()>>>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    // a panicking test thread must not wedge every other test sharing the store
    tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn course_from(id: i64, c: &NewCourse) -> Course {
    Course {
        id,
        name: c.name.clone(),
        code: c.code.clone(),
        description: c.description.clone(),
        start_time: c.start_time,
        end_time: c.end_time,
        capacity: c.capacity,
        duration: c.duration,
        category: c.category.clone(),
        weekday: c.weekday.clone(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.inner.tables)
    }

    pub fn seed_user(&self, name: &str, email: &str, password_hash: &str, role_id: i64) -> User {
        let mut tables = self.tables();
        let id = tables.next_id();
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role_id,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        user
    }

    pub fn seed_course(&self, course: &NewCourse) -> Course {
        let mut tables = self.tables();
        let id = tables.next_id();
        let course = course_from(id, course);
        tables.courses.insert(id, course.clone());
        course
    }

    /// Overwrites an invite row in place, bypassing every check.
    pub fn put_invite(&self, invite: InviteCode) {
        self.tables().invites.insert(invite.id, invite);
    }

    pub fn invite_by_code(&self, code: &str) -> Option<InviteCode> {
        self.tables().invites.values().find(|i| i.code == code).cloned()
    }

    pub fn invites(&self) -> Vec<InviteCode> {
        self.tables().invites.values().cloned().collect()
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.tables().users.values().find(|u| u.email == email).cloned()
    }

    pub fn enrollment_count(&self, course_id: i64) -> i64 {
        self.tables().registered_count(course_id)
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            inner: Arc::clone(&self.inner),
            held: HashSet::new(),
            guards: Vec::new(),
            pending: Vec::new(),
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.user_by_email(email))
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.email_taken(&new_user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let id = tables.next_id();
        let user = User {
            id,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role_id: new_user.role_id,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, name: &str, email: &str) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables();
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        if tables.users.values().any(|u| u.id != id && u.email == email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        Ok(tables.users.get_mut(&id).map(|user| {
            user.name = name.to_string();
            user.email = email.to_string();
            user.clone()
        }))
    }

    async fn delete_user(&self, id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        if tables.users.remove(&id).is_none() {
            return Ok(0);
        }
        tables.enrollments.retain(|_, e| e.student_id != id);
        for invite in tables.invites.values_mut() {
            if invite.inviter_id == Some(id) {
                invite.inviter_id = None;
            }
        }
        Ok(1)
    }

    async fn find_course(&self, id: i64) -> Result<Option<Course>, StoreError> {
        Ok(self.tables().courses.get(&id).cloned())
    }

    async fn list_courses(&self, limit: i64, offset: i64) -> Result<Vec<Course>, StoreError> {
        let mut courses: Vec<Course> = self.tables().courses.values().cloned().collect();
        courses.sort_by_key(|c| (c.start_time, c.id));
        Ok(courses
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_courses(&self) -> Result<i64, StoreError> {
        Ok(self.tables().courses.len() as i64)
    }

    async fn courses_for_student(&self, student_id: i64) -> Result<Vec<Course>, StoreError> {
        let tables = self.tables();
        let mut courses: Vec<Course> = tables
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id && e.status == EnrollmentStatus::Registered)
            .filter_map(|e| tables.courses.get(&e.course_id).cloned())
            .collect();
        courses.sort_by_key(|c| (c.start_time, c.id));
        Ok(courses)
    }

    async fn create_course(&self, new_course: &NewCourse) -> Result<Course, StoreError> {
        Ok(self.seed_course(new_course))
    }

    async fn delete_course(&self, id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        if tables.courses.remove(&id).is_none() {
            return Ok(0);
        }
        tables.enrollments.retain(|_, e| e.course_id != id);
        Ok(1)
    }

    async fn count_registered(&self, course_id: i64) -> Result<i64, StoreError> {
        Ok(self.enrollment_count(course_id))
    }

    async fn enrollments_for_course(&self, course_id: i64) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self
            .tables()
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn delete_enrollment(&self, student_id: i64, course_id: i64) -> Result<u64, StoreError> {
        let mut tables = self.tables();
        let before = tables.enrollments.len();
        tables
            .enrollments
            .retain(|_, e| !(e.student_id == student_id && e.course_id == course_id));
        Ok((before - tables.enrollments.len()) as u64)
    }

    async fn insert_invite(&self, invite: &NewInviteCode) -> Result<Option<InviteCode>, StoreError> {
        let mut tables = self.tables();
        if tables.invites.values().any(|i| i.code == invite.code) {
            return Ok(None);
        }
        let id = tables.next_id();
        let row = InviteCode {
            id,
            code: invite.code.clone(),
            inviter_id: Some(invite.inviter_id),
            invitee_email: invite.invitee_email.clone(),
            status: Some(InviteStatus::Active),
            created_at: invite.created_at,
            expired_at: invite.expired_at,
            used_at: None,
        };
        tables.invites.insert(id, row.clone());
        Ok(Some(row))
    }
}

enum Pending {
    Enrollment(Enrollment),
    User(User),
    CourseUpdate(Course),
    InviteUsed {
        id: i64,
        email: String,
        used_at: DateTime<Utc>,
    },
}

pub struct MemoryTx {
    inner: Arc<Inner>,
    held: HashSet<RowKey>,
    guards: Vec<OwnedMutexGuard<()>>,
    pending: Vec<Pending>,
}

impl MemoryTx {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.inner.tables)
    }

    async fn acquire(&mut self, key: RowKey) {
        if self.held.contains(&key) {
            return;
        }
        let row_lock = {
            let mut locks = self
                .inner
                .row_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(key).or_default())
        };
        self.guards.push(row_lock.lock_owned().await);
        self.held.insert(key);
    }

    fn pending_enrollments(&self) -> impl Iterator<Item = &Enrollment> {
        self.pending.iter().filter_map(|p| match p {
            Pending::Enrollment(e) => Some(e),
            _ => None,
        })
    }

    fn pending_users(&self) -> impl Iterator<Item = &User> {
        self.pending.iter().filter_map(|p| match p {
            Pending::User(u) => Some(u),
            _ => None,
        })
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_course(&mut self, id: i64) -> Result<Option<Course>, StoreError> {
        tokio::task::yield_now().await;
        self.acquire(RowKey::Course(id)).await;
        Ok(self.tables().courses.get(&id).cloned())
    }

    async fn enrollment_exists(&mut self, student_id: i64, course_id: i64) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        let committed = self.tables().enrolled(student_id, course_id);
        Ok(committed
            || self
                .pending_enrollments()
                .any(|e| e.student_id == student_id && e.course_id == course_id))
    }

    async fn count_registered(&mut self, course_id: i64) -> Result<i64, StoreError> {
        tokio::task::yield_now().await;
        let committed = self.tables().registered_count(course_id);
        let staged = self.pending_enrollments().filter(|e| e.course_id == course_id).count() as i64;
        Ok(committed + staged)
    }

    async fn insert_enrollment(
        &mut self,
        student_id: i64,
        course_id: i64,
        enroll_time: DateTime<Utc>,
    ) -> Result<Enrollment, StoreError> {
        tokio::task::yield_now().await;
        if self.enrollment_exists(student_id, course_id).await? {
            return Err(StoreError::UniqueViolation(
                "enrollments_student_id_course_id_key".to_string(),
            ));
        }
        let id = self.tables().next_id();
        let enrollment = Enrollment {
            id,
            student_id,
            course_id,
            status: EnrollmentStatus::Registered,
            enroll_time,
        };
        self.pending.push(Pending::Enrollment(enrollment.clone()));
        Ok(enrollment)
    }

    async fn update_course(&mut self, id: i64, new_course: &NewCourse) -> Result<Course, StoreError> {
        tokio::task::yield_now().await;
        let course = course_from(id, new_course);
        self.pending.push(Pending::CourseUpdate(course.clone()));
        Ok(course)
    }

    async fn lock_invite(&mut self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        tokio::task::yield_now().await;
        let id = match self.tables().invites.values().find(|i| i.code == code) {
            Some(invite) => invite.id,
            None => return Ok(None),
        };
        self.acquire(RowKey::Invite(id)).await;
        // re-read after the lock: a previous holder may have committed changes
        Ok(self.tables().invites.get(&id).cloned())
    }

    async fn insert_user(&mut self, new_user: &NewUser) -> Result<User, StoreError> {
        tokio::task::yield_now().await;
        let taken = self.tables().email_taken(&new_user.email)
            || self.pending_users().any(|u| u.email == new_user.email);
        if taken {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let id = self.tables().next_id();
        let user = User {
            id,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role_id: new_user.role_id,
            created_at: Utc::now(),
        };
        self.pending.push(Pending::User(user.clone()));
        Ok(user)
    }

    async fn mark_invite_used(
        &mut self,
        id: i64,
        email: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.pending.push(Pending::InviteUsed {
            id,
            email: email.to_string(),
            used_at,
        });
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut tables = lock(&self.inner.tables);
        for p in &self.pending {
            match p {
                Pending::User(u) if tables.email_taken(&u.email) => {
                    return Err(StoreError::UniqueViolation("users_email_key".to_string()));
                }
                Pending::Enrollment(e) if tables.enrolled(e.student_id, e.course_id) => {
                    return Err(StoreError::UniqueViolation(
                        "enrollments_student_id_course_id_key".to_string(),
                    ));
                }
                _ => {}
            }
        }
        for p in self.pending {
            match p {
                Pending::Enrollment(e) => {
                    tables.enrollments.insert(e.id, e);
                }
                Pending::User(u) => {
                    tables.users.insert(u.id, u);
                }
                Pending::CourseUpdate(c) => {
                    tables.courses.insert(c.id, c);
                }
                Pending::InviteUsed { id, email, used_at } => {
                    if let Some(invite) = tables.invites.get_mut(&id) {
                        invite.status = Some(InviteStatus::Used);
                        invite.used_at = Some(used_at);
                        invite.invitee_email = Some(email);
                    }
                }
            }
        }
        // row locks in `self.guards` are released when `self` drops here
        Ok(())
    }
}

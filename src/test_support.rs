//! Shared fixtures for unit and handler tests.

use std::sync::{Arc, Mutex};

use actix_web::web;
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use mockable::Clock;

use crate::{
    config::JwtSecret,
    db::memory::MemoryStore,
    models::NewCourse,
    service::auth::jwt::TokenService,
};

pub const TEST_SECRET: &str = "test-signing-secret-with-32-bytes!!";

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(Mutex::new(instant))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock mutex")
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().expect("clock mutex");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
                .single()
                .expect("valid fixture timestamp"),
        )
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.now()
    }
}

pub fn token_service(clock: Arc<ManualClock>) -> TokenService {
    TokenService::new(
        JwtSecret::new(TEST_SECRET).expect("test secret is long enough"),
        Duration::hours(48),
        clock,
    )
}

/// Registers the shared state `main` would: store, token service and clock.
pub fn app_state(store: MemoryStore, clock: Arc<ManualClock>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        let tokens = token_service(clock.clone());
        let clock: Arc<dyn Clock> = clock;
        cfg.app_data(web::Data::new(store))
            .app_data(web::Data::new(tokens))
            .app_data(web::Data::from(clock));
    }
}

pub fn new_course(code: &str, capacity: i32) -> NewCourse {
    NewCourse {
        name: format!("Course {code}"),
        code: code.to_string(),
        description: String::new(),
        start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        end_time: NaiveTime::from_hms_opt(10, 30, 0).expect("valid time"),
        capacity,
        duration: 90,
        category: "general".to_string(),
        weekday: "Monday".to_string(),
    }
}

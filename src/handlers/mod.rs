pub mod auth;
pub mod course;
pub mod user;

use actix_web::web;

use crate::{db::Store, errors::AppError};

/// Malformed JSON bodies come back in the same `{"error": ..}` shape as every
/// other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| AppError::validation(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::validation(err.to_string()).into())
}

pub fn configure<S: Store>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(web::scope("/auth").configure(auth::init_routes::<S>))
        .service(web::scope("/classes").configure(course::init_routes::<S>))
        .service(web::scope("/users").configure(user::init_routes::<S>));
}

pub mod auth;
pub mod course;
pub mod crypto;
pub mod enrollment;
pub mod invite;
pub mod log;
pub mod user;

//! Coursify backend: the course material catalog, the download
//! feedback reminder pipeline, rating intake, and the surrounding
//! auth/profile/bookmark/dashboard surfaces.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod reminders;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;
pub mod utils;
pub mod workers;

pub use workers::ReminderWorker;

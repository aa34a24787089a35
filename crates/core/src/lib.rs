//! Core library for the Pipedeck CRM backend
//!
//! This crate contains the core business logic, including:
//! - Role and permission evaluation
//! - Deal lifecycle transitions and the activity timeline
//! - Contact and task services
//! - Deal analytics with a TTL cache

pub mod activity;
pub mod analytics;
pub mod contact;
pub mod deal;
pub mod error;
pub mod permission;
pub mod store;
pub mod task;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

//! # Campus Common Library
//!
//! Shared code for the campus record services including:
//! - Bootstrap configuration loading
//! - Database pool initialization and schema
//! - Calendar date and weekday handling
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod schedule;
pub mod time;

pub use error::{Error, Result};
pub use schedule::Day;

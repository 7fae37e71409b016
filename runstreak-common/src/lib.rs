//! # Runstreak Common Library
//!
//! Shared code for the runstreak crates including:
//! - Configuration loading
//! - Challenge day calendar
//! - Activity record model and its persisted format
//! - Clock abstraction

pub mod calendar;
pub mod config;
pub mod error;
pub mod record;
pub mod time;

pub use calendar::{current_day, day_date, harvest_window_start};
pub use config::StreakConfig;
pub use error::{Error, Result};
pub use record::ActivityRecord;
pub use time::{Clock, FixedClock, SystemClock};

//! WINQER Core - Shared domain types and metric math.
//!
//! This crate provides the pieces used by every WINQER component:
//! - `dashboard` - HTTP backend aggregating Meta Ads, GA4 and Business Profile
//! - `cli` - Command-line tools for migrations and store management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, roles, platforms and plans
//! - [`metrics`] - Daily platform metrics, date ranges and derived ratios
//! - [`scoring`] - Ad performance scoring

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod metrics;
pub mod scoring;
pub mod types;

pub use metrics::{DailyRecord, DateRange, DateRangeError, fill_days};
pub use scoring::{AdMetrics, AdPerformance, analyze_ad_performance};
pub use types::*;

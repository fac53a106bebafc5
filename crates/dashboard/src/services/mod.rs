//! Request-level orchestration on top of repositories and API clients.

pub mod access;
pub mod analytics;
pub mod creatives;

pub use access::{check_role, load_store_for, require_store_role};
pub use analytics::{
    DashboardReport, DataSource, PlatformReport, PlatformStatus, store_ads, store_dashboard,
};
pub use creatives::{CreativeResponse, generate_creatives};

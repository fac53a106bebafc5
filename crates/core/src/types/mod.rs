//! Core types for WINQER.
//!
//! Type-safe wrappers for IDs, emails, roles, platforms and plans.

pub mod email;
pub mod id;
pub mod platform;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use platform::{PlanTier, Platform};
pub use role::{OrgRole, StoreRole};

//! Domain models for the dashboard.

pub mod session;
pub mod store;

pub use session::{CurrentUser, OAuthProvider, OAuthState, keys as session_keys};
pub use store::{BillingUpdate, NewStore, Store, StoreMember, StoreSettings, StoreSummary};

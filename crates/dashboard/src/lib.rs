//! WINQER dashboard library.
//!
//! The dashboard backend as a library, so the CLI and integration tests can
//! reuse its repositories, clients and router.
//!
//! # External services
//!
//! - Supabase Auth (identity) and Postgres (storage)
//! - Meta Graph API, Google Analytics 4, Google Business Profile (read-only metrics)
//! - Stripe Checkout (billing)
//! - `OpenAI` / Gemini (ad creative generation)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod google;
pub mod meta;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;
pub mod supabase;

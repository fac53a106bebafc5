//! Stripe billing: Checkout Sessions and webhook handling.
//!
//! # Flow
//!
//! 1. A store admin asks for a plan; [`StripeClient::create_checkout_session`]
//!    returns a hosted Checkout URL carrying the store ID
//! 2. Stripe calls `/api/stripe/webhook`; [`verify_signature`] checks the
//!    `Stripe-Signature` header against the raw body
//! 3. [`billing_action`] turns the event into a plan change for one store

mod client;
mod webhook;

pub use client::{CheckoutSession, StripeClient};
pub use webhook::{
    BillingAction, BillingTarget, EventData, SIGNATURE_TOLERANCE_SECS, WebhookEvent, billing_action,
    verify_signature,
};

use thiserror::Error;

/// Errors that can occur when interacting with Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("Stripe request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Invalid webhook signature.
    #[error("Invalid Stripe signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a usable event.
    #[error("Invalid Stripe event: {0}")]
    InvalidPayload(String),

    /// The requested plan has no Stripe price.
    #[error("plan {0} cannot be purchased")]
    UnpurchasablePlan(winqer_core::PlanTier),
}

//! Submission lifecycle manager for e-signature requests.
//!
//! Owns the authoritative state machine for outbound signature requests:
//! creation, delivery, viewing, completion, expiry, decline, and resend,
//! plus callback notification on every transition. Provider connectivity
//! goes through the [`locum_core::provider::SignatureProvider`] seam; the
//! bundled [`SandboxProvider`] simulates webhook delivery with timers for
//! development and tests.

mod manager;
mod pdf;
mod sandbox;

pub use locum_core::{Error, Result};
pub use manager::{DeliveryTiming, LifecycleManager};
pub use pdf::completion_certificate;
pub use sandbox::SandboxProvider;

#[cfg(test)]
mod tests;

//! Core types and trait definitions for the Locum document core.
//!
//! This crate is deliberately free of HTTP and filesystem dependencies.
//! The storage, e-sign, and API crates all depend on it; it depends on
//! nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod provider;
pub mod storage;
pub mod submission;
pub mod template;

pub use error::{Error, Result};

//! Core types and trait definitions for the Folio publishing engine.
//!
//! This crate is deliberately free of HTTP, filesystem and database
//! dependencies. All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod collision;
pub mod document;
pub mod error;
pub mod slug;
pub mod store;

pub use error::{Error, Result};

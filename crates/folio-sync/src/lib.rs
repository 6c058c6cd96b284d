//! Content synchronization engine for Folio.
//!
//! Keeps a tree of rendered HTML files and the CID ↔ URL mapping consistent
//! with a mutable [`DocumentStore`](folio_core::store::DocumentStore). Two
//! triggers drive it: the polling [`Reconciler`] and the immediate publish
//! operations on [`SyncEngine`]. Both go through the same primitives.

pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod links;
pub mod materialize;
pub mod reconcile;
pub mod registry;
pub mod render;
pub mod service;
pub mod snapshot;

mod publish;

pub use config::{Origin, SiteConfig};
pub use engine::SyncEngine;
pub use error::{Error, Result};
pub use reconcile::{CycleReport, Reconciler};
pub use registry::PathRegistry;
pub use render::{MarkdownRenderer, Renderer};
pub use service::SyncService;

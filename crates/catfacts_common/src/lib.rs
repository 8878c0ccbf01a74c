//! Cat Facts Common - Shared types, storage and upstream client
//!
//! The daemon composes these pieces into the fact catalog service.

pub mod catalog;
pub mod categories;
pub mod display;
pub mod export;
pub mod fetch_client;

pub use catalog::*;
pub use categories::{classify, DEFAULT_CATEGORY};
pub use fetch_client::{CatFactClient, FactSource, FetchError, ScriptedFactSource, UpstreamConfig};

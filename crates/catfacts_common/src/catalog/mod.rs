//! Fact Catalog
//!
//! Persistent catalog of fetched cat facts. Facts are stored as flat records
//! with a favorite flag, a 0-5 rating and the category assigned at fetch time.

pub mod schema;
pub mod store;

pub use schema::*;
pub use store::*;

//! # inventory-store
//!
//! Graph-store access for the inventory: connection settings, typed read
//! queries, N-Quad mutations, a pluggable backend (HTTP or in-memory) and a
//! reader that turns raw rows into typed documents.
//!
//! ```text
//! Reader ──► GraphClient ──► dyn GraphBackend ──┬─► HttpBackend (/query, /mutate, /alter)
//!                │                              └─► MemoryGraph
//!                └─► Txn (single-shot commit)
//! ```

pub mod client;
pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod mutation;
pub mod query;
pub mod reader;

pub use client::{GraphBackend, GraphClient, Txn};
pub use config::StoreConfig;
pub use error::StoreError;
pub use memory::MemoryGraph;
pub use mutation::{entry_nquads, Mutation, MutationResponse, NQuad, Object};
pub use query::{CompareOp, Edge, Filter, Func, Query, Selection};
pub use reader::{
    Document, EntryCheck, EntrySelector, Field, ListRequest, Projection, Reader, UserRecord,
};

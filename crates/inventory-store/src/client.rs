//! Client handle and transaction guard over a pluggable backend.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::mutation::{Mutation, MutationResponse};
use crate::query::Query;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a graph store must offer: queries, atomic mutations, schema alters.
pub trait GraphBackend: Send + Sync {
    /// Runs `query`, returning `{ "<block>": [ ... ] }`.
    fn query(&self, query: &Query) -> Result<JsonValue, StoreError>;

    /// Applies deletes then sets atomically, committing immediately.
    fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError>;

    /// Installs a storage schema (predicate and type declarations).
    fn alter(&self, schema: &str) -> Result<(), StoreError>;

    fn close(&self) {}
}

/// Shared handle to a graph store.
///
/// Cheap to clone; every clone talks to the same backend.
#[derive(Clone)]
pub struct GraphClient {
    backend: Arc<dyn GraphBackend>,
    config: StoreConfig,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("endpoint", &self.config.endpoint)
            .field("read_only", &self.config.read_only)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl GraphClient {
    /// Connects to the HTTP API at `config.endpoint`.
    #[cfg(feature = "http")]
    pub fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        let backend = crate::http::HttpBackend::new(&config)?;
        tracing::info!(endpoint = %config.endpoint, "connected to graph store");
        Ok(Self::with_backend(Arc::new(backend), config))
    }

    pub fn with_backend(backend: Arc<dyn GraphBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn query(&self, query: &Query) -> Result<JsonValue, StoreError> {
        self.ensure_open()?;
        tracing::trace!(block = %query.block, "query");
        self.backend.query(query)
    }

    /// Runs `query` and returns the array under its block name.
    pub fn query_block(&self, query: &Query) -> Result<Vec<JsonValue>, StoreError> {
        let mut data = self.query(query)?;
        match data.get_mut(&query.block).map(JsonValue::take) {
            Some(JsonValue::Array(rows)) => Ok(rows),
            Some(JsonValue::Null) | None => Ok(Vec::new()),
            Some(other) => Err(StoreError::Decode(format!(
                "block `{}` is not an array: {other}",
                query.block
            ))),
        }
    }

    pub fn mutate(&self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        self.ensure_open()?;
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        tracing::debug!(
            set = mutation.set.len(),
            delete = mutation.delete.len(),
            upsert = mutation.query.is_some(),
            "mutate"
        );
        self.backend.mutate(mutation)
    }

    pub fn alter(&self, schema: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        if self.config.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.backend.alter(schema)
    }

    pub fn txn(&self) -> Txn<'_> {
        Txn::new(self, false)
    }

    pub fn read_only_txn(&self) -> Txn<'_> {
        Txn::new(self, true)
    }

    /// Closes the backend; later calls through any clone fail with `Closed`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.backend.close();
            tracing::debug!("graph client closed");
        }
    }
}

/// A single-shot unit of work.
///
/// Queries run against committed state; `commit` applies one mutation.
/// A transaction dropped without committing is discarded.
pub struct Txn<'a> {
    client: &'a GraphClient,
    read_only: bool,
    finished: bool,
}

impl<'a> Txn<'a> {
    fn new(client: &'a GraphClient, read_only: bool) -> Self {
        Self {
            client,
            read_only,
            finished: false,
        }
    }

    pub fn query(&self, query: &Query) -> Result<JsonValue, StoreError> {
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.client.query(query)
    }

    pub fn commit(&mut self, mutation: &Mutation) -> Result<MutationResponse, StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        if self.finished {
            return Err(StoreError::Finished);
        }
        self.finished = true;
        self.client.mutate(mutation)
    }

    pub fn discard(mut self) {
        self.finished = true;
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.read_only {
            tracing::trace!("transaction discarded without commit");
        }
    }
}

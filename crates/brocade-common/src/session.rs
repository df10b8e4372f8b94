//! Generic short-lived storage traits and utilities.
//!
//! The relying party uses a [`SessionStore`] keyed by authentication
//! scheme to hold the single-use correlation token between a challenge
//! and its callback. Hosts conventionally back this with a cookie; the
//! bundled [`MemorySessionStore`] is for tests and single-process
//! development servers.

use async_trait::async_trait;
use miette::Diagnostic;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors emitted by session stores.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum SessionStoreError {
    /// Filesystem or I/O error
    #[error("I/O error: {0}")]
    #[diagnostic(code(brocade::session_store::io))]
    Io(#[from] std::io::Error),
    /// Serialization error (e.g., JSON)
    #[error("serialization error: {0}")]
    #[diagnostic(code(brocade::session_store::serde))]
    Serde(#[from] serde_json::Error),
    /// Any other error from a backend implementation
    #[error(transparent)]
    #[diagnostic(code(brocade::session_store::other))]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Pluggable storage for arbitrary short-lived records.
#[async_trait]
pub trait SessionStore<K, T>: Send + Sync
where
    K: Eq + Hash,
    T: Clone,
{
    /// Get the current record if present.
    async fn get(&self, key: &K) -> Option<T>;
    /// Persist the given record.
    async fn set(&self, key: K, value: T) -> Result<(), SessionStoreError>;
    /// Delete the given record.
    async fn del(&self, key: &K) -> Result<(), SessionStoreError>;
}

/// In-memory store suitable for short-lived records and tests.
#[derive(Clone)]
pub struct MemorySessionStore<K, T>(Arc<RwLock<HashMap<K, T>>>);

impl<K, T> Default for MemorySessionStore<K, T> {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(HashMap::new())))
    }
}

#[async_trait]
impl<K, T> SessionStore<K, T> for MemorySessionStore<K, T>
where
    K: Eq + Hash + Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<T> {
        self.0.read().await.get(key).cloned()
    }
    async fn set(&self, key: K, value: T) -> Result<(), SessionStoreError> {
        self.0.write().await.insert(key, value);
        Ok(())
    }
    async fn del(&self, key: &K) -> Result<(), SessionStoreError> {
        self.0.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl<K, T, S> SessionStore<K, T> for Arc<S>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    S: SessionStore<K, T>,
{
    async fn get(&self, key: &K) -> Option<T> {
        self.as_ref().get(key).await
    }
    async fn set(&self, key: K, value: T) -> Result<(), SessionStoreError> {
        self.as_ref().set(key, value).await
    }
    async fn del(&self, key: &K) -> Result<(), SessionStoreError> {
        self.as_ref().del(key).await
    }
}

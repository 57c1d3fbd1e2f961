pub mod mongo;

#[cfg(test)]
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::schema::{ExistingIndex, IndexSpec};

pub use mongo::MongoTarget;

/// The database operations the initializer and verifier drive.
#[async_trait]
pub trait SchemaTarget: Send + Sync {
    fn database_name(&self) -> &str;

    async fn collection_names(&self) -> Result<Vec<String>>;

    /// Returns `false` when the collection already existed by the time the
    /// create reached the server.
    async fn create_collection(&self, name: &str) -> Result<bool>;

    /// Returns the index name the server recorded.
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String>;

    /// An absent collection has no indexes.
    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>>;
}

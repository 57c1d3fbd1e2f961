use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::Document;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database, IndexModel};
use tracing::debug;

use crate::schema::{ExistingIndex, IndexSpec};
use crate::target::SchemaTarget;

const NAMESPACE_NOT_FOUND: i32 = 26;
const NAMESPACE_EXISTS: i32 = 48;

#[derive(Debug, Clone)]
pub struct MongoTarget {
    db: Database,
}

impl MongoTarget {
    pub async fn connect(uri: &str, database: &str, app_name: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("failed parsing MongoDB connection string")?;
        options.app_name = Some(app_name.to_string());
        let client = Client::with_options(options).context("failed building MongoDB client")?;
        debug!("selected database {database}");
        Ok(Self::from_database(client.database(database)))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SchemaTarget for MongoTarget {
    fn database_name(&self) -> &str {
        self.db.name()
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.db.list_collection_names().await?)
    }

    async fn create_collection(&self, name: &str) -> Result<bool> {
        match self.db.create_collection(name).await {
            Ok(()) => Ok(true),
            Err(err) if command_code(&err) == Some(NAMESPACE_EXISTS) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String> {
        let result = self
            .db
            .collection::<Document>(collection)
            .create_index(index.to_model())
            .await?;
        Ok(result.index_name)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
        let cursor = match self.db.collection::<Document>(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let models: Vec<IndexModel> = cursor.try_collect().await?;
        Ok(models.iter().map(ExistingIndex::from_model).collect())
    }
}

fn command_code(err: &MongoError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::schema::{IndexSpec, SchemaPlan};
use crate::target::SchemaTarget;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Existing,
    WouldCreate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub name: String,
    pub keys: String,
    pub unique: bool,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    pub name: String,
    pub outcome: Outcome,
    pub indexes: Vec<IndexReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub database: String,
    pub dry_run: bool,
    pub collections: Vec<CollectionReport>,
    pub finished_at: DateTime<Utc>,
}

impl InitReport {
    pub fn created_collections(&self) -> usize {
        self.collections
            .iter()
            .filter(|c| c.outcome == Outcome::Created)
            .count()
    }

    pub fn created_indexes(&self) -> usize {
        self.index_outcomes()
            .filter(|o| *o == Outcome::Created)
            .count()
    }

    /// True when nothing was (or would be) written.
    pub fn is_noop(&self) -> bool {
        self.collections
            .iter()
            .map(|c| c.outcome)
            .chain(self.index_outcomes())
            .all(|o| o == Outcome::Existing)
    }

    fn index_outcomes(&self) -> impl Iterator<Item = Outcome> + '_ {
        self.collections
            .iter()
            .flat_map(|c| c.indexes.iter().map(|i| i.outcome))
    }
}

pub struct Initializer<'a> {
    target: &'a dyn SchemaTarget,
    dry_run: bool,
}

impl<'a> Initializer<'a> {
    pub fn new(target: &'a dyn SchemaTarget) -> Self {
        Self {
            target,
            dry_run: false,
        }
    }

    /// Reads current state but issues no writes.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn ensure_collection(&self, name: &str) -> Result<Outcome> {
        let names = self
            .target
            .collection_names()
            .await
            .with_context(|| format!("failed listing collections in {}", self.target.database_name()))?;
        if names.iter().any(|n| n == name) {
            debug!("collection {name} already exists");
            return Ok(Outcome::Existing);
        }
        if self.dry_run {
            return Ok(Outcome::WouldCreate);
        }
        let created = self
            .target
            .create_collection(name)
            .await
            .with_context(|| format!("failed creating collection {name}"))?;
        if created {
            info!("created collection {name}");
            Ok(Outcome::Created)
        } else {
            warn!("collection {name} was created concurrently");
            Ok(Outcome::Existing)
        }
    }

    pub async fn ensure_index(&self, collection: &str, index: &IndexSpec) -> Result<Outcome> {
        let existing = self
            .target
            .list_indexes(collection)
            .await
            .with_context(|| format!("failed listing indexes on {collection}"))?;
        if let Some(found) = existing.iter().find(|e| index.matches(e)) {
            debug!("index {} on {collection} already exists", found.name);
            return Ok(Outcome::Existing);
        }
        if self.dry_run {
            return Ok(Outcome::WouldCreate);
        }
        let name = self
            .target
            .create_index(collection, index)
            .await
            .with_context(|| format!("failed creating index {} on {collection}", index.name()))?;
        info!("created index {name} on {collection}");
        Ok(Outcome::Created)
    }

    pub async fn run(&self, plan: &SchemaPlan) -> Result<InitReport> {
        plan.validate()?;
        let mut collections = Vec::with_capacity(plan.collections.len());
        for spec in &plan.collections {
            let outcome = self.ensure_collection(&spec.name).await?;
            let mut indexes = Vec::with_capacity(spec.indexes.len());
            for index in &spec.indexes {
                let index_outcome = self.ensure_index(&spec.name, index).await?;
                indexes.push(IndexReport {
                    name: index.name(),
                    keys: index.describe_keys(),
                    unique: index.unique,
                    outcome: index_outcome,
                });
            }
            collections.push(CollectionReport {
                name: spec.name.clone(),
                outcome,
                indexes,
            });
        }
        let report = InitReport {
            database: self.target.database_name().to_string(),
            dry_run: self.dry_run,
            collections,
            finished_at: Utc::now(),
        };
        info!(
            "schema run on {} finished: {} collection(s) and {} index(es) created",
            report.database,
            report.created_collections(),
            report.created_indexes()
        );
        Ok(report)
    }
}

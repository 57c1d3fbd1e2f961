use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schema::SchemaPlan;
use crate::target::SchemaTarget;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    Present {
        name: String,
    },
    UniquenessMismatch {
        name: String,
        expected: bool,
        actual: bool,
    },
    /// Same keys, but the index only covers part of the collection or
    /// compares values under a collation.
    OptionsMismatch {
        name: String,
        options: Vec<String>,
    },
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexCheck {
    pub expected_name: String,
    pub keys: String,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCheck {
    pub name: String,
    pub exists: bool,
    pub indexes: Vec<IndexCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub database: String,
    pub collections: Vec<CollectionCheck>,
    pub checked_at: DateTime<Utc>,
}

impl SchemaReport {
    pub fn is_satisfied(&self) -> bool {
        self.issues() == 0
    }

    pub fn issues(&self) -> usize {
        self.collections
            .iter()
            .map(|c| {
                let missing_collection = usize::from(!c.exists);
                let index_issues = c
                    .indexes
                    .iter()
                    .filter(|i| !matches!(i.status, IndexStatus::Present { .. }))
                    .count();
                missing_collection + index_issues
            })
            .sum()
    }
}

/// Compares the live schema with `plan` without writing anything.
pub async fn verify_schema(target: &dyn SchemaTarget, plan: &SchemaPlan) -> Result<SchemaReport> {
    let names = target
        .collection_names()
        .await
        .with_context(|| format!("failed listing collections in {}", target.database_name()))?;
    let mut collections = Vec::with_capacity(plan.collections.len());
    for spec in &plan.collections {
        let exists = names.iter().any(|n| n == &spec.name);
        let existing = if exists {
            target
                .list_indexes(&spec.name)
                .await
                .with_context(|| format!("failed listing indexes on {}", spec.name))?
        } else {
            warn!("collection {} is missing", spec.name);
            Vec::new()
        };

        let mut indexes = Vec::with_capacity(spec.indexes.len());
        for index in &spec.indexes {
            let status = if let Some(found) = existing.iter().find(|e| index.matches(e)) {
                IndexStatus::Present {
                    name: found.name.clone(),
                }
            } else if let Some(found) = existing
                .iter()
                .find(|e| index.same_keys(e) && e.is_restricted())
            {
                let options = found.restrictions();
                warn!(
                    "index {} on {} is restricted ({}) but a full index is declared",
                    found.name,
                    spec.name,
                    options.join(", ")
                );
                IndexStatus::OptionsMismatch {
                    name: found.name.clone(),
                    options,
                }
            } else if let Some(found) = existing.iter().find(|e| index.same_keys(e)) {
                warn!(
                    "index {} on {} has unique={} but unique={} is declared",
                    found.name, spec.name, found.unique, index.unique
                );
                IndexStatus::UniquenessMismatch {
                    name: found.name.clone(),
                    expected: index.unique,
                    actual: found.unique,
                }
            } else {
                IndexStatus::Missing
            };
            indexes.push(IndexCheck {
                expected_name: index.name(),
                keys: index.describe_keys(),
                status,
            });
        }
        collections.push(CollectionCheck {
            name: spec.name.clone(),
            exists,
            indexes,
        });
    }
    Ok(SchemaReport {
        database: target.database_name().to_string(),
        collections,
        checked_at: Utc::now(),
    })
}

//! Fact Catalog Service
//!
//! Composes the upstream fact source and the fact store. Failures from either
//! are logged and degrade to an empty, `false` or `None` result so pages keep
//! rendering. Export is the exception: its errors reach the caller.

use anyhow::{bail, Context, Result};
use catfacts_common::export::{export_file_name, render_report};
use catfacts_common::{Fact, FactFilter, FactSource, FactStore, Statistics, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

/// Facts shown in the recent list on the home page
pub const RECENT_LIMIT: usize = 10;

/// Favorites shown on the home page
pub const FAVORITES_LIMIT: usize = 5;

/// Exports sharing one timestamp before giving up on a free name
const MAX_EXPORT_NAME_ATTEMPTS: u32 = 1000;

/// Data for the home page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeSummary {
    pub recent_facts: Vec<Fact>,
    pub favorite_facts: Vec<Fact>,
    pub total_count: usize,
    pub average_rating: f64,
}

/// Business operations over the fact catalog
pub struct FactCatalogService {
    store: Arc<dyn FactStore>,
    source: Arc<dyn FactSource>,
    export_dir: PathBuf,
}

impl FactCatalogService {
    pub fn new(store: Arc<dyn FactStore>, source: Arc<dyn FactSource>, export_dir: PathBuf) -> Self {
        Self {
            store,
            source,
            export_dir,
        }
    }

    /// Run a store call on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn FactStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .context("Store task failed")??;
        Ok(value)
    }

    /// Recent facts, top favorites and statistics, read concurrently
    pub async fn home_summary(&self) -> HomeSummary {
        info!("Loading home page data");

        let loaded = tokio::try_join!(
            self.with_store(|store| store.get_recent(RECENT_LIMIT)),
            self.with_store(|store| store.get_favorites()),
            self.with_store(|store| store.statistics()),
        );

        match loaded {
            Ok((recent_facts, mut favorite_facts, Statistics { total_count, average_rating })) => {
                favorite_facts.truncate(FAVORITES_LIMIT);
                info!("Loaded home page data: {} facts", total_count);
                HomeSummary {
                    recent_facts,
                    favorite_facts,
                    total_count,
                    average_rating,
                }
            }
            Err(e) => {
                error!("Failed to load home page data: {:#}", e);
                HomeSummary::default()
            }
        }
    }

    /// Fetch one fact and store it unless it is already known
    pub async fn fetch_and_save_one(&self) -> Option<Fact> {
        info!("Fetching and saving a new fact");

        let Some(fact) = self.source.fetch_one().await else {
            warn!("No fact received from the upstream API");
            return None;
        };

        match self.save_if_new(fact).await {
            Ok(Some(saved)) => {
                info!("Saved new fact: ID {}", saved.id);
                Some(saved)
            }
            Ok(None) => {
                info!("Fact already exists in the catalog");
                None
            }
            Err(e) => {
                error!("Failed to save fetched fact: {:#}", e);
                None
            }
        }
    }

    /// Fetch `count` facts and store the new ones, one at a time
    pub async fn fetch_and_save_many(&self, count: usize) -> Vec<Fact> {
        info!("Fetching and saving {} facts", count);

        let fetched = match self.source.fetch_many(count).await {
            Ok(facts) => facts,
            Err(e) => {
                error!("Failed to fetch facts: {}", e);
                return Vec::new();
            }
        };

        // Sequential so duplicates within the batch are caught by the store
        let mut saved = Vec::with_capacity(fetched.len());
        for fact in fetched {
            match self.save_if_new(fact).await {
                Ok(Some(fact)) => saved.push(fact),
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to save fetched facts: {:#}", e);
                    return saved;
                }
            }
        }

        info!("Saved {} of {} requested facts", saved.len(), count);
        saved
    }

    async fn save_if_new(&self, fact: Fact) -> Result<Option<Fact>> {
        self.with_store(move |store| {
            if store.exists(&fact.text)? {
                return Ok(None);
            }
            // A concurrent save may win between the check and the insert
            match store.add(&fact) {
                Ok(saved) => Ok(Some(saved)),
                Err(StoreError::Duplicate(_)) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    pub async fn toggle_favorite(&self, id: i64) -> bool {
        info!("Toggling favorite for fact ID {}", id);
        self.with_store(move |store| store.toggle_favorite(id))
            .await
            .unwrap_or_else(|e| {
                error!("Failed to toggle favorite for fact ID {}: {:#}", id, e);
                false
            })
    }

    pub async fn rate(&self, id: i64, rating: i32) -> bool {
        info!("Rating fact ID {} as {}", id, rating);
        self.with_store(move |store| store.rate(id, rating))
            .await
            .unwrap_or_else(|e| {
                error!("Failed to rate fact ID {}: {:#}", id, e);
                false
            })
    }

    pub async fn delete(&self, id: i64) -> bool {
        info!("Deleting fact ID {}", id);
        self.with_store(move |store| store.delete(id))
            .await
            .unwrap_or_else(|e| {
                error!("Failed to delete fact ID {}: {:#}", id, e);
                false
            })
    }

    pub async fn get_fact(&self, id: i64) -> Option<Fact> {
        self.with_store(move |store| store.get_by_id(id))
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load fact ID {}: {:#}", id, e);
                None
            })
    }

    pub async fn filter(&self, filter: FactFilter) -> Vec<Fact> {
        info!("Filtering facts");
        self.with_store(move |store| store.filter(&filter))
            .await
            .unwrap_or_else(|e| {
                error!("Failed to filter facts: {:#}", e);
                Vec::new()
            })
    }

    /// Distinct non-empty categories, sorted
    pub async fn categories(&self) -> Vec<String> {
        let facts = match self.with_store(|store| store.get_all()).await {
            Ok(facts) => facts,
            Err(e) => {
                error!("Failed to load categories: {:#}", e);
                return Vec::new();
            }
        };

        let mut categories: Vec<String> = facts
            .into_iter()
            .filter_map(|f| f.category)
            .filter(|c| !c.trim().is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    pub async fn upstream_available(&self) -> bool {
        self.source.probe_availability().await
    }

    pub async fn total_facts(&self) -> usize {
        self.with_store(|store| store.statistics())
            .await
            .map(|stats| stats.total_count)
            .unwrap_or_else(|e| {
                error!("Failed to count facts: {:#}", e);
                0
            })
    }

    /// Write all facts, or the filtered ones, to a text report
    pub async fn export_to_file(&self, filter: Option<FactFilter>) -> Result<PathBuf> {
        info!("Exporting facts to file");

        let facts = match filter {
            Some(filter) => self.with_store(move |store| store.filter(&filter)).await,
            None => self.with_store(|store| store.get_all()).await,
        }
        .context("Failed to load facts for export")?;

        let exported_at = Utc::now();
        let report = render_report(&facts, &exported_at);

        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .with_context(|| format!("Failed to create export dir {}", self.export_dir.display()))?;
        let (path, mut file) = self.create_export_file(&exported_at).await?;
        file.write_all(report.as_bytes())
            .await
            .with_context(|| format!("Failed to write export file {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to flush export file {}", path.display()))?;

        info!("Exported {} facts to {}", facts.len(), path.display());
        Ok(path)
    }

    /// Claim a file name no other export holds; later claims get a suffix
    async fn create_export_file(&self, exported_at: &DateTime<Utc>) -> Result<(PathBuf, File)> {
        for attempt in 0..MAX_EXPORT_NAME_ATTEMPTS {
            let path = self.export_dir.join(export_file_name(exported_at, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create export file {}", path.display()))
                }
            }
        }
        bail!(
            "No free export file name in {} after {} attempts",
            self.export_dir.display(),
            MAX_EXPORT_NAME_ATTEMPTS
        )
    }
}

//! Engine configuration, loaded from JSON and overridden from the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{self, Schema};
use crate::engine::QueryEngine;
use crate::error::ConfigError;
use crate::index::{IndexOptions, SearchIndex};
use crate::ranking::{RankPolicy, UnknownWordPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub dataset: PathBuf,
    pub stop_words: PathBuf,
    pub schema: Schema,
    /// Field separator of the dataset file.
    pub separator: String,
    pub min_occurrences: usize,
    pub correction_radius: i64,
    pub rank_policy: RankPolicy,
    pub unknown_words: UnknownWordPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/dishes.psv"),
            stop_words: PathBuf::from("data/stop_words_en.txt"),
            schema: Schema::default(),
            separator: "|".to_string(),
            min_occurrences: 1,
            correction_radius: 2,
            rank_policy: RankPolicy::default(),
            unknown_words: UnknownWordPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.separator.is_empty() {
            return Err(ConfigError::invalid("separator", "must not be empty"));
        }
        if self.min_occurrences == 0 {
            return Err(ConfigError::invalid("min_occurrences", "must be at least 1"));
        }
        if self.correction_radius < 0 {
            return Err(ConfigError::invalid(
                "correction_radius",
                format!("{} is negative", self.correction_radius),
            ));
        }
        for (what, path) in [("dataset", &self.dataset), ("stop words", &self.stop_words)] {
            if !path.exists() {
                return Err(ConfigError::MissingPath {
                    what,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            min_occurrences: self.min_occurrences,
            correction_radius: self.correction_radius,
            ..IndexOptions::for_schema(self.schema)
        }
    }

    /// Loads the dataset and stop words, builds the index, and wraps it in an engine.
    pub fn build_engine(&self) -> Result<QueryEngine, ConfigError> {
        self.validate()?;
        let stop_words = dataset::load_stop_words(&self.stop_words)?;
        let records = dataset::load_dataset(&self.dataset, self.schema, &self.separator)?;
        let index = SearchIndex::build(&records, stop_words, &self.index_options())?;
        if index.vocabulary_len() == 0 {
            return Err(ConfigError::EmptyIndex(self.dataset.clone()));
        }
        info!(
            schema = %self.schema,
            rank_policy = %self.rank_policy,
            unknown_words = %self.unknown_words,
            "Query engine ready"
        );
        Ok(QueryEngine::new(Arc::new(index))
            .with_rank_policy(self.rank_policy)
            .with_unknown_words(self.unknown_words))
    }
}

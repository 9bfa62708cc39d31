//! Typo-tolerant lexical search over restaurant menus.
//!
//! A dataset of dishes is tokenized once into an inverted index whose vocabulary is mirrored in a
//! BK-tree. Queries go through the same tokenizer plus a spelling corrector, every surviving
//! token votes for the dishes that contain it, and the votes are sorted by rank, price or
//! distance. With the `server` feature the engine is exposed over TCP using length-prefixed JSON.

pub mod bktree;
pub mod config;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod index;
pub mod metric;
pub mod ordering;
pub mod pipeline;
pub mod protocol;
pub mod ranking;

#[cfg(feature = "server")]
pub mod client;
#[cfg(feature = "server")]
pub mod server;

pub use bktree::{BkTree, Similar};
pub use config::EngineConfig;
pub use data::{Dish, DishId, Location, Restaurant, RestaurantId};
pub use dataset::{Record, Schema};
pub use engine::{DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT, QueryEngine};
pub use error::{ConfigError, QueryError, TreeError};
pub use index::{IndexOptions, InvertedIndex, SearchIndex};
pub use metric::{Levenshtein, Metric, levenshtein};
pub use ordering::{Ordering, Rankable, Rule};
pub use pipeline::{Stemmer, StopWords, TokenPipeline};
pub use protocol::{Request, Response, ResultRecord, Status};
pub use ranking::{DishMatch, RankPolicy, RankingAggregator, RestaurantMatch, UnknownWordPolicy};

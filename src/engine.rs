use std::sync::Arc;

use tracing::{debug, info};

use crate::data::Location;
use crate::error::QueryError;
use crate::index::SearchIndex;
use crate::ordering::{Ordering, Rule, top_k};
use crate::pipeline::TokenPipeline;
use crate::protocol::{Request, Response, ResultRecord};
use crate::ranking::{
    DishHit, DishMatch, RankPolicy, RankingAggregator, RestaurantHit, RestaurantMatch,
    UnknownWordPolicy,
};

/// Results returned when a request does not ask for a limit.
pub const DEFAULT_RESULT_LIMIT: usize = 20;
/// Upper bound for a requested limit.
pub const MAX_RESULT_LIMIT: usize = 100;

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_RESULT_LIMIT)
        .clamp(1, MAX_RESULT_LIMIT)
}

/// Resolves queries against one shared, read-only index.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: Arc<SearchIndex>,
    pipeline: TokenPipeline,
    unknown_words: UnknownWordPolicy,
    rank_policy: RankPolicy,
}

impl QueryEngine {
    pub fn new(index: Arc<SearchIndex>) -> Self {
        let pipeline = index.query_pipeline();
        Self {
            index,
            pipeline,
            unknown_words: UnknownWordPolicy::default(),
            rank_policy: RankPolicy::default(),
        }
    }

    pub fn with_unknown_words(mut self, policy: UnknownWordPolicy) -> Self {
        self.unknown_words = policy;
        self
    }

    pub fn with_rank_policy(mut self, policy: RankPolicy) -> Self {
        self.rank_policy = policy;
        self
    }

    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }

    pub fn pipeline(&self) -> &TokenPipeline {
        &self.pipeline
    }

    pub fn rank_policy(&self) -> RankPolicy {
        self.rank_policy
    }

    /// Ranked dish matches, in dish id order.
    pub fn search(&self, query: &str) -> Result<Vec<DishMatch>, QueryError> {
        RankingAggregator::new(&self.index)
            .try_aggregate(self.pipeline.tokens(query), self.unknown_words)
    }

    /// Dish matches grouped per restaurant under the configured rank policy.
    pub fn search_restaurants(&self, query: &str) -> Result<Vec<RestaurantMatch>, QueryError> {
        let matches = self.search(query)?;
        Ok(RankingAggregator::new(&self.index).group_by_restaurant(&matches, self.rank_policy))
    }

    /// Sorted, truncated dish hits ready for display.
    pub fn top_dishes(
        &self,
        query: &str,
        ordering: Ordering,
        rule: Rule,
        origin: &Location,
        limit: usize,
    ) -> Result<Vec<DishHit<'_>>, QueryError> {
        let hits: Vec<_> = self
            .search(query)?
            .iter()
            .map(|found| DishHit::resolve(&self.index, found))
            .collect();
        Ok(top_k(hits, ordering, rule, origin, limit))
    }

    /// Sorted, truncated restaurant hits ready for display.
    pub fn top_restaurants(
        &self,
        query: &str,
        ordering: Ordering,
        rule: Rule,
        origin: &Location,
        limit: usize,
    ) -> Result<Vec<RestaurantHit<'_>>, QueryError> {
        let hits: Vec<_> = self
            .search_restaurants(query)?
            .iter()
            .map(|found| RestaurantHit::resolve(&self.index, found))
            .collect();
        Ok(top_k(hits, ordering, rule, origin, limit))
    }

    /// Answers one wire request. Query errors become failure responses.
    pub fn respond(&self, request: &Request) -> Response {
        let origin = Location::from(request.location.clone());
        let limit = clamp_limit(request.limit);
        let client = request.name.as_deref().unwrap_or("anonymous client");

        match self.top_dishes(&request.query, request.ordering, request.rule, &origin, limit) {
            Ok(hits) => {
                info!(
                    client,
                    query = %request.query,
                    ordering = %request.ordering,
                    rule = %request.rule,
                    results = hits.len(),
                    "Answered query"
                );
                Response::success(hits.iter().map(ResultRecord::from).collect())
            }
            Err(err) => {
                debug!(client, query = %request.query, error = %err, "Rejected query");
                Response::failure(format!(
                    "Failed while processing data for {}: {err}",
                    request.query
                ))
            }
        }
    }
}

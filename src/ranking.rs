//! Turns processed tokens into ranked dish and restaurant matches.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{Dish, DishId, Location, Restaurant, RestaurantId};
use crate::error::QueryError;
use crate::index::SearchIndex;
use crate::ordering::descending_nan_last;

/// A dish and the number of query tokens whose postings contain it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DishMatch {
    pub dish: DishId,
    pub rank: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantMatch {
    pub restaurant: RestaurantId,
    /// Member dishes, most expensive first.
    pub dishes: Vec<DishId>,
    pub rank: f64,
}

/// How member dish ranks combine into a restaurant rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankPolicy {
    Sum,
    #[default]
    Average,
}

impl FromStr for RankPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(RankPolicy::Sum),
            "average" | "avg" | "mean" => Ok(RankPolicy::Average),
            other => Err(format!("unknown rank policy `{other}` (expected sum or average)")),
        }
    }
}

impl fmt::Display for RankPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankPolicy::Sum => write!(f, "sum"),
            RankPolicy::Average => write!(f, "average"),
        }
    }
}

/// What happens when a token cannot be corrected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownWordPolicy {
    /// The whole query fails.
    #[default]
    Fail,
    /// The token is ignored.
    Skip,
}

impl FromStr for UnknownWordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(UnknownWordPolicy::Fail),
            "skip" => Ok(UnknownWordPolicy::Skip),
            other => Err(format!("unknown word policy `{other}` (expected fail or skip)")),
        }
    }
}

impl fmt::Display for UnknownWordPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownWordPolicy::Fail => write!(f, "fail"),
            UnknownWordPolicy::Skip => write!(f, "skip"),
        }
    }
}

pub struct RankingAggregator<'a> {
    index: &'a SearchIndex,
}

impl<'a> RankingAggregator<'a> {
    pub fn new(index: &'a SearchIndex) -> Self {
        Self { index }
    }

    /// Counts, per dish, how many tokens hit it. Repeated tokens count every time. Tokens with
    /// no postings contribute nothing. Matches come back in dish id order.
    pub fn aggregate<I, S>(&self, tokens: I) -> Vec<DishMatch>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: BTreeMap<DishId, u32> = BTreeMap::new();
        for token in tokens {
            for &dish in self.index.postings(token.as_ref()) {
                *counts.entry(dish).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(dish, count)| DishMatch {
                dish,
                rank: f64::from(count),
            })
            .collect()
    }

    /// [`RankingAggregator::aggregate`] over a fallible token stream.
    pub fn try_aggregate<I>(
        &self,
        tokens: I,
        policy: UnknownWordPolicy,
    ) -> Result<Vec<DishMatch>, QueryError>
    where
        I: IntoIterator<Item = Result<String, QueryError>>,
    {
        let mut words = Vec::new();
        for token in tokens {
            match (token, policy) {
                (Ok(word), _) => words.push(word),
                (Err(err), UnknownWordPolicy::Fail) => return Err(err),
                (Err(err), UnknownWordPolicy::Skip) => debug!(error = %err, "skipping token"),
            }
        }
        Ok(self.aggregate(words))
    }

    /// Groups dish matches by restaurant, in order of first appearance.
    pub fn group_by_restaurant(
        &self,
        matches: &[DishMatch],
        policy: RankPolicy,
    ) -> Vec<RestaurantMatch> {
        let mut order: Vec<RestaurantId> = Vec::new();
        let mut groups: BTreeMap<RestaurantId, (Vec<DishId>, f64)> = BTreeMap::new();
        for found in matches {
            let restaurant = self.index.dish(found.dish).restaurant;
            let group = groups.entry(restaurant).or_insert_with(|| {
                order.push(restaurant);
                (Vec::new(), 0.0)
            });
            group.0.push(found.dish);
            group.1 += found.rank;
        }

        order
            .into_iter()
            .filter_map(|restaurant| {
                let (mut dishes, total) = groups.remove(&restaurant)?;
                let rank = match policy {
                    RankPolicy::Sum => total,
                    RankPolicy::Average => total / dishes.len() as f64,
                };
                dishes.sort_by(|a, b| {
                    descending_nan_last(self.index.dish(*a).price, self.index.dish(*b).price)
                });
                Some(RestaurantMatch {
                    restaurant,
                    dishes,
                    rank,
                })
            })
            .collect()
    }
}

/// A dish match resolved against the index.
#[derive(Debug, Clone, Copy)]
pub struct DishHit<'a> {
    pub dish: &'a Dish,
    pub restaurant: &'a Restaurant,
    pub rank: f64,
}

impl<'a> DishHit<'a> {
    pub fn resolve(index: &'a SearchIndex, found: &DishMatch) -> Self {
        let dish = index.dish(found.dish);
        Self {
            dish,
            restaurant: index.restaurant(dish.restaurant),
            rank: found.rank,
        }
    }

    pub fn location(&self) -> &'a Location {
        &self.restaurant.location
    }
}

/// A restaurant match resolved against the index.
#[derive(Debug, Clone)]
pub struct RestaurantHit<'a> {
    pub restaurant: &'a Restaurant,
    pub dishes: Vec<&'a Dish>,
    pub rank: f64,
}

impl<'a> RestaurantHit<'a> {
    pub fn resolve(index: &'a SearchIndex, found: &RestaurantMatch) -> Self {
        Self {
            restaurant: index.restaurant(found.restaurant),
            dishes: found.dishes.iter().map(|&id| index.dish(id)).collect(),
            rank: found.rank,
        }
    }

    /// The cheapest priced member dish, NaN when none has a price.
    pub fn lowest_price(&self) -> f64 {
        self.dishes
            .iter()
            .map(|dish| dish.price)
            .filter(|price| !price.is_nan())
            .fold(f64::NAN, f64::min)
    }
}

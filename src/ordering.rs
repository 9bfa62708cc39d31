//! Result ordering by rank, price or distance.
//!
//! In the normal direction results run highest rank first, cheapest first, or nearest first.
//! [`Rule::Reversed`] flips the comparator. Missing prices and unknown locations compare after
//! every number in the normal direction. Sorting is stable.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::Location;
use crate::ranking::{DishHit, RestaurantHit};

/// Which key results are sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    #[default]
    ByRank,
    ByPrice,
    ByLocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    #[default]
    Normal,
    Reversed,
}

impl FromStr for Ordering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "by_rank" | "rank" => Ok(Ordering::ByRank),
            "by_price" | "price" => Ok(Ordering::ByPrice),
            "by_location" | "location" => Ok(Ordering::ByLocation),
            other => Err(format!(
                "unknown ordering `{other}` (expected by_rank, by_price or by_location)"
            )),
        }
    }
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ordering::ByRank => "by_rank",
            Ordering::ByPrice => "by_price",
            Ordering::ByLocation => "by_location",
        };
        f.write_str(name)
    }
}

impl FromStr for Rule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Rule::Normal),
            "reversed" | "reverse" => Ok(Rule::Reversed),
            other => Err(format!("unknown rule `{other}` (expected normal or reversed)")),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Normal => f.write_str("normal"),
            Rule::Reversed => f.write_str("reversed"),
        }
    }
}

/// Anything that can be placed in a result list.
pub trait Rankable {
    fn rank(&self) -> f64;
    /// NaN when unknown.
    fn price(&self) -> f64;
    fn location(&self) -> &Location;
}

impl Rankable for DishHit<'_> {
    fn rank(&self) -> f64 {
        self.rank
    }

    fn price(&self) -> f64 {
        self.dish.price
    }

    fn location(&self) -> &Location {
        &self.restaurant.location
    }
}

impl Rankable for RestaurantHit<'_> {
    fn rank(&self) -> f64 {
        self.rank
    }

    fn price(&self) -> f64 {
        self.lowest_price()
    }

    fn location(&self) -> &Location {
        &self.restaurant.location
    }
}

/// Ascending, NaN after every number.
pub(crate) fn ascending_nan_last(a: f64, b: f64) -> CmpOrdering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal),
    }
}

/// Descending, NaN after every number.
pub(crate) fn descending_nan_last(a: f64, b: f64) -> CmpOrdering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => ascending_nan_last(b, a),
        _ => ascending_nan_last(a, b),
    }
}

fn compare<T: Rankable>(a: &T, b: &T, ordering: Ordering, origin: &Location) -> CmpOrdering {
    match ordering {
        Ordering::ByRank => descending_nan_last(a.rank(), b.rank()),
        Ordering::ByPrice => ascending_nan_last(a.price(), b.price()),
        Ordering::ByLocation => ascending_nan_last(
            a.location().distance_to(origin),
            b.location().distance_to(origin),
        ),
    }
}

/// Stable sort of `items`; `origin` is only consulted for [`Ordering::ByLocation`].
pub fn sort_results<T: Rankable>(
    items: &mut [T],
    ordering: Ordering,
    rule: Rule,
    origin: &Location,
) {
    items.sort_by(|a, b| {
        let order = compare(a, b, ordering, origin);
        match rule {
            Rule::Normal => order,
            Rule::Reversed => order.reverse(),
        }
    });
}

/// Sorts and keeps the first `k` results.
pub fn top_k<T: Rankable>(
    mut items: Vec<T>,
    ordering: Ordering,
    rule: Rule,
    origin: &Location,
    k: usize,
) -> Vec<T> {
    sort_results(&mut items, ordering, rule, origin);
    items.truncate(k);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Item {
        name: &'static str,
        rank: f64,
        price: f64,
        location: Location,
    }

    impl Rankable for Item {
        fn rank(&self) -> f64 {
            self.rank
        }
        fn price(&self) -> f64 {
            self.price
        }
        fn location(&self) -> &Location {
            &self.location
        }
    }

    fn item(name: &'static str, rank: f64, price: f64, lat: f64) -> Item {
        Item {
            name,
            rank,
            price,
            location: Location::new(lat, 0.0),
        }
    }

    fn items() -> Vec<Item> {
        vec![
            item("a", 1.0, 10.0, 5.0),
            item("b", 3.0, f64::NAN, 1.0),
            item("c", 2.0, 5.0, f64::NAN),
            item("d", 3.0, 7.0, 3.0),
        ]
    }

    fn names(items: &[Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.name).collect()
    }

    fn sorted(ordering: Ordering, rule: Rule) -> Vec<&'static str> {
        let mut list = items();
        sort_results(&mut list, ordering, rule, &Location::new(0.0, 0.0));
        names(&list)
    }

    #[test]
    fn rank_is_highest_first_and_stable() {
        assert_eq!(sorted(Ordering::ByRank, Rule::Normal), ["b", "d", "c", "a"]);
    }

    #[test]
    fn price_is_cheapest_first_with_missing_last() {
        assert_eq!(sorted(Ordering::ByPrice, Rule::Normal), ["c", "d", "a", "b"]);
        assert_eq!(sorted(Ordering::ByPrice, Rule::Reversed), ["b", "a", "d", "c"]);
    }

    #[test]
    fn location_is_nearest_first_with_unknown_last() {
        assert_eq!(sorted(Ordering::ByLocation, Rule::Normal), ["b", "d", "a", "c"]);
    }

    #[test]
    fn reversed_flips_rank() {
        assert_eq!(sorted(Ordering::ByRank, Rule::Reversed), ["a", "c", "b", "d"]);
    }

    #[test]
    fn top_k_truncates_after_sorting() {
        let top = top_k(items(), Ordering::ByRank, Rule::Normal, &Location::NONE, 2);
        assert_eq!(names(&top), ["b", "d"]);
        assert!(top_k(Vec::<Item>::new(), Ordering::ByPrice, Rule::Normal, &Location::NONE, 5)
            .is_empty());
    }

    #[test]
    fn comparators_handle_nan() {
        assert_eq!(ascending_nan_last(1.0, f64::NAN), CmpOrdering::Less);
        assert_eq!(descending_nan_last(1.0, f64::NAN), CmpOrdering::Less);
        assert_eq!(descending_nan_last(2.0, 1.0), CmpOrdering::Less);
        assert_eq!(ascending_nan_last(f64::NAN, f64::NAN), CmpOrdering::Equal);
    }

    #[test]
    fn selectors_parse_and_print() {
        assert_eq!("by-price".parse::<Ordering>(), Ok(Ordering::ByPrice));
        assert_eq!("location".parse::<Ordering>(), Ok(Ordering::ByLocation));
        assert_eq!("REVERSED".parse::<Rule>(), Ok(Rule::Reversed));
        assert_eq!(Ordering::ByRank.to_string(), "by_rank");
        assert_eq!(serde_json::to_string(&Ordering::ByLocation).unwrap(), "\"by_location\"");
        assert!("by_taste".parse::<Ordering>().is_err());
    }
}

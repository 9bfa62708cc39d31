use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DishId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RestaurantId(pub u32);

impl DishId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl RestaurantId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A point in (latitude, longitude) space.
///
/// Distances are plain Euclidean distances over the raw coordinates. This is a planar
/// approximation, not a geodesic one. Unknown coordinates are NaN, see [`Location::NONE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub description: Option<String>,
}

impl Location {
    pub const NONE: Location = Location {
        lat: f64::NAN,
        lon: f64::NAN,
        description: None,
    };

    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            description: None,
        }
    }

    /// A location known only by its address text.
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::NONE
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Parses raw coordinate fields, falling back to [`Location::NONE`] when either is not a
    /// number.
    pub fn parse(lat: &str, lon: &str, description: Option<&str>) -> Self {
        match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Self {
                lat,
                lon,
                description: description.map(str::to_owned),
            },
            _ => Self::NONE,
        }
    }

    pub fn is_known(&self) -> bool {
        !self.lat.is_nan() && !self.lon.is_nan()
    }

    /// Euclidean distance; NaN when either side has unknown coordinates.
    pub fn distance_to(&self, other: &Location) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits()
            && self.lon.to_bits() == other.lon.to_bits()
            && self.description == other.description
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lat.to_bits().hash(state);
        self.lon.to_bits().hash(state);
        self.description.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    pub description: Option<String>,
    pub location: Location,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, description: Option<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            description,
            location,
        }
    }
}

/// Restaurants are the same venue when name and location agree; the description is free text
/// and does not take part.
impl PartialEq for Restaurant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.location == other.location
    }
}

impl Eq for Restaurant {}

impl Hash for Restaurant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.location.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub description: String,
    pub restaurant: RestaurantId,
    /// NaN when the dataset price could not be parsed.
    pub price: f64,
}

impl Dish {
    pub fn parse_price(raw: &str) -> f64 {
        raw.trim().parse().unwrap_or(f64::NAN)
    }

    pub fn has_price(&self) -> bool {
        !self.price.is_nan()
    }
}

impl PartialEq for Dish {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
            && self.restaurant == other.restaurant
            && self.price.to_bits() == other.price.to_bits()
    }
}

impl Eq for Dish {}

impl Hash for Dish {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.description.hash(state);
        self.restaurant.hash(state);
        self.price.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn unparseable_coordinates_become_none() {
        let loc = Location::parse("50.45", "n/a", Some("Khreshchatyk 1"));
        assert!(!loc.is_known());
        assert_eq!(loc, Location::NONE);
        let ok = Location::parse(" 50.45 ", "30.52", None);
        assert!(ok.is_known());
        assert_eq!(ok.lat, 50.45);
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert!(a.distance_to(&Location::NONE).is_nan());
    }

    #[test]
    fn restaurant_identity_ignores_description() {
        let here = Location::new(1.0, 2.0);
        let a = Restaurant::new("Luigi", Some("family run".into()), here.clone());
        let b = Restaurant::new("Luigi", None, here);
        let c = Restaurant::new("Luigi", None, Location::new(1.0, 2.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn dishes_with_missing_prices_still_compare_equal() {
        let a = Dish {
            description: "Margherita".into(),
            restaurant: RestaurantId(0),
            price: Dish::parse_price("free"),
        };
        assert!(!a.has_price());
        assert_eq!(a, a.clone());
        let priced = Dish {
            price: 7.5,
            ..a.clone()
        };
        assert_ne!(a, priced);
    }
}

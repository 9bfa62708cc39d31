//! The immutable search index: postings, dish and restaurant arenas, and the vocabulary tree.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::bktree::{BkTree, DEFAULT_THRESHOLD};
use crate::data::{Dish, DishId, Restaurant, RestaurantId};
use crate::dataset::{Record, Schema};
use crate::error::ConfigError;
use crate::pipeline::{Delimiters, SpellCorrector, Stemmer, StopWords, TokenPipeline, WordFilter};

/// How dish descriptions are turned into index words.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub delimiters: Delimiters,
    pub filter: WordFilter,
    pub stemmer: Stemmer,
    /// Words attached to fewer dishes than this are dropped.
    pub min_occurrences: usize,
    /// Spell-correction radius stored on the vocabulary tree.
    pub correction_radius: i64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            filter: WordFilter::default(),
            stemmer: Stemmer::default(),
            min_occurrences: 1,
            correction_radius: DEFAULT_THRESHOLD as i64,
        }
    }
}

impl IndexOptions {
    pub fn for_schema(schema: Schema) -> Self {
        Self {
            filter: schema.word_filter(),
            stemmer: schema.stemmer(),
            ..Self::default()
        }
    }
}

/// Word to dish postings plus the arenas the ids point into.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<DishId>>,
    dishes: Vec<Dish>,
    restaurants: Vec<Restaurant>,
}

impl InvertedIndex {
    /// Sorted, deduplicated dish ids for `word`; empty when the word is unknown.
    pub fn postings(&self, word: &str) -> &[DishId] {
        self.postings.get(word).map_or(&[], Vec::as_slice)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.postings.contains_key(word)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        self.postings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn dish(&self, id: DishId) -> &Dish {
        &self.dishes[id.index()]
    }

    pub fn restaurant(&self, id: RestaurantId) -> &Restaurant {
        &self.restaurants[id.index()]
    }

    pub fn dishes(&self) -> &[Dish] {
        &self.dishes
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }
}

#[derive(Debug, Clone)]
pub struct SearchIndex {
    inverted: InvertedIndex,
    tree: BkTree,
    stop_words: Arc<StopWords>,
    delimiters: Delimiters,
    stemmer: Stemmer,
}

impl SearchIndex {
    /// Builds the index once from parsed dataset rows.
    pub fn build(
        records: &[Record],
        stop_words: StopWords,
        options: &IndexOptions,
    ) -> Result<Self, ConfigError> {
        let stop_words = Arc::new(stop_words);
        let mut inverted = InvertedIndex::default();
        let mut restaurant_ids: HashMap<Restaurant, RestaurantId> = HashMap::new();
        let mut dish_ids: HashMap<Dish, DishId> = HashMap::new();

        for record in records {
            let restaurant = match restaurant_ids.entry(record.restaurant.clone()) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let id = RestaurantId(inverted.restaurants.len() as u32);
                    inverted.restaurants.push(record.restaurant.clone());
                    *entry.insert(id)
                }
            };
            let dish = Dish {
                description: record.dish.clone(),
                restaurant,
                price: record.price,
            };
            if let Entry::Vacant(entry) = dish_ids.entry(dish) {
                let id = DishId(inverted.dishes.len() as u32);
                inverted.dishes.push(entry.key().clone());
                entry.insert(id);
            }
        }

        let tokenizer = TokenPipeline::builder()
            .delimiters(options.delimiters.clone())
            .stop_words(Arc::clone(&stop_words))
            .filter(options.filter)
            .stemmer(options.stemmer.clone())
            .build();
        let words: Vec<Vec<String>> = inverted
            .dishes
            .par_iter()
            .map(|dish| {
                tokenizer
                    .tokens(&dish.description)
                    .filter_map(Result::ok)
                    .collect()
            })
            .collect();

        for (position, dish_words) in words.into_iter().enumerate() {
            let id = DishId(position as u32);
            for word in dish_words {
                let list = inverted.postings.entry(word).or_default();
                if list.last() != Some(&id) {
                    list.push(id);
                }
            }
        }

        let total = inverted.postings.len();
        inverted
            .postings
            .retain(|_, dishes| dishes.len() >= options.min_occurrences);

        let mut vocabulary: Vec<&str> = inverted.words().collect();
        vocabulary.sort_unstable();
        let mut tree = BkTree::default();
        tree.set_threshold(options.correction_radius)
            .map_err(|err| ConfigError::invalid("correction_radius", err.to_string()))?;
        tree.extend(vocabulary);

        info!(
            dishes = inverted.dishes.len(),
            restaurants = inverted.restaurants.len(),
            words = inverted.postings.len(),
            dropped = total - inverted.postings.len(),
            "Built search index"
        );

        Ok(Self {
            inverted,
            tree,
            stop_words,
            delimiters: options.delimiters.clone(),
            stemmer: options.stemmer.clone(),
        })
    }

    pub fn inverted(&self) -> &InvertedIndex {
        &self.inverted
    }

    pub fn tree(&self) -> &BkTree {
        &self.tree
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    pub fn postings(&self, word: &str) -> &[DishId] {
        self.inverted.postings(word)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.inverted.contains_word(word)
    }

    pub fn dish(&self, id: DishId) -> &Dish {
        self.inverted.dish(id)
    }

    pub fn restaurant(&self, id: RestaurantId) -> &Restaurant {
        self.inverted.restaurant(id)
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = &str> + '_ {
        self.inverted.words()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.inverted.len()
    }

    pub fn len(&self) -> usize {
        self.inverted.dishes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverted.dishes.is_empty()
    }

    /// The query-time pipeline: same splitting and stemming as the index, then spelling
    /// correction against this index's vocabulary.
    pub fn query_pipeline(self: &Arc<Self>) -> TokenPipeline {
        TokenPipeline::builder()
            .delimiters(self.delimiters.clone())
            .stop_words(Arc::clone(&self.stop_words))
            .stemmer(self.stemmer.clone())
            .corrector(SpellCorrector::new(Arc::clone(self)))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Location;

    fn records() -> Vec<Record> {
        let luigi = Restaurant::new("Luigi", None, Location::new(0.0, 0.0));
        let mario = Restaurant::new("Mario", None, Location::new(3.0, 4.0));
        vec![
            Record::new(luigi.clone(), "Pizza Margherita", 9.0),
            Record::new(luigi.clone(), "Pizza with the Salami", 11.0),
            Record::new(luigi.clone(), "Pizza Margherita", 9.0),
            Record::new(mario.clone(), "Pasta Carbonara", 12.0),
            Record::new(mario, "Pizza pizza", 8.0),
        ]
    }

    fn build(options: &IndexOptions) -> SearchIndex {
        SearchIndex::build(&records(), StopWords::from_text("the with"), options).unwrap()
    }

    #[test]
    fn deduplicates_restaurants_and_dishes() {
        let index = build(&IndexOptions::default());
        assert_eq!(index.inverted().restaurants().len(), 2);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn postings_are_sorted_and_unique() {
        let index = build(&IndexOptions::default());
        let pizza = index.postings("pizza");
        assert_eq!(pizza, [DishId(0), DishId(1), DishId(3)]);
        assert_eq!(index.postings("carbonara"), [DishId(2)]);
        assert!(index.postings("sushi").is_empty());
    }

    #[test]
    fn stop_words_are_not_indexed() {
        let index = build(&IndexOptions::default());
        assert!(!index.contains_word("the"));
        assert!(!index.contains_word("with"));
        assert!(index.stop_words().contains("the"));
    }

    #[test]
    fn tree_vocabulary_matches_postings() {
        let index = build(&IndexOptions::default());
        let mut from_tree: Vec<_> = index.tree().iter().collect();
        let mut from_postings: Vec<_> = index.vocabulary().collect();
        from_tree.sort_unstable();
        from_postings.sort_unstable();
        assert_eq!(from_tree, from_postings);
    }

    #[test]
    fn rare_words_are_dropped() {
        let options = IndexOptions {
            min_occurrences: 2,
            ..IndexOptions::default()
        };
        let index = build(&options);
        assert!(index.contains_word("pizza"));
        assert!(!index.contains_word("salami"));
        assert!(!index.tree().contains("salami"));
    }

    #[test]
    fn schema_filter_and_stemmer_apply() {
        let place = Restaurant::new("Diner", None, Location::NONE);
        let records = vec![Record::new(place, "Two Eggs & 3 pancakes on a plate", 5.0)];
        let index = SearchIndex::build(
            &records,
            StopWords::default(),
            &IndexOptions::for_schema(Schema::English),
        )
        .unwrap();
        let stem = |w| Stemmer::English.stem(w);
        let mut words: Vec<_> = index.vocabulary().map(str::to_owned).collect();
        words.sort_unstable();
        let mut expected = vec![stem("eggs"), stem("pancakes"), stem("plate"), stem("two")];
        expected.sort_unstable();
        assert_eq!(words, expected);
        assert!(index.contains_word(&stem("pancake")));
        assert!(!index.contains_word("pancakes"));
    }

    #[test]
    fn negative_radius_is_a_config_error() {
        let options = IndexOptions {
            correction_radius: -1,
            ..IndexOptions::default()
        };
        let err = SearchIndex::build(&records(), StopWords::default(), &options).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { name: "correction_radius", .. }
        ));
    }

    #[test]
    fn query_pipeline_corrects_against_vocabulary() {
        let index = Arc::new(build(&IndexOptions::default()));
        let pipeline = index.query_pipeline();
        assert_eq!(pipeline.collect("The Piza").unwrap(), ["pizza"]);
    }
}

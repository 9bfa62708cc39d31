//! BK-tree over an edit-distance metric.
//!
//! Nodes live in a flat arena and refer to their children by index. Each node's children are
//! keyed by their distance *to that node's word*, so a radius query only descends into the keys
//! the triangle inequality allows: `[max(1, d - r), d + r]`.
//!
//! The tree is append-only. Words are never removed: pulling a node out would mean re-inserting
//! its whole subtree, and the vocabulary is fixed once the index is loaded.

use std::collections::{BTreeMap, VecDeque};

use crate::error::TreeError;
use crate::metric::{Levenshtein, Metric};

/// Default radius used by [`BkTree::similar`].
pub const DEFAULT_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Node {
    word: String,
    children: BTreeMap<usize, NodeId>,
}

/// A vocabulary word found within some radius of a probe word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Similar<'a> {
    pub word: &'a str,
    pub distance: usize,
}

#[derive(Debug, Clone)]
pub struct BkTree<M = Levenshtein> {
    metric: M,
    nodes: Vec<Node>,
    threshold: usize,
}

impl Default for BkTree<Levenshtein> {
    fn default() -> Self {
        Self::new(Levenshtein)
    }
}

impl<M: Metric> BkTree<M> {
    pub fn new(metric: M) -> Self {
        Self {
            metric,
            nodes: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_threshold(metric: M, threshold: i64) -> Result<Self, TreeError> {
        let mut tree = Self::new(metric);
        tree.set_threshold(threshold)?;
        Ok(tree)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Changes the radius used by [`BkTree::similar`]. Negative radii are rejected.
    pub fn set_threshold(&mut self, threshold: i64) -> Result<(), TreeError> {
        self.threshold = validate_threshold(threshold)?;
        Ok(())
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `word` to the tree. Returns `false` when an identical word is already stored.
    pub fn insert(&mut self, word: &str) -> bool {
        if self.nodes.is_empty() {
            self.push_node(word);
            return true;
        }

        let mut current = NodeId(0);
        loop {
            let node = &self.nodes[current.index()];
            let distance = self.metric.distance(word, &node.word);
            if distance == 0 {
                return false;
            }
            match node.children.get(&distance) {
                Some(&child) => current = child,
                None => {
                    let child = self.push_node(word);
                    self.nodes[current.index()].children.insert(distance, child);
                    return true;
                }
            }
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let mut current = NodeId(0);
        loop {
            let node = &self.nodes[current.index()];
            let distance = self.metric.distance(&node.word, word);
            if distance == 0 {
                return true;
            }
            match node.children.get(&distance) {
                Some(&child) => current = child,
                None => return false,
            }
        }
    }

    /// Every stored word within `threshold` edits of `word`, in no particular order.
    pub fn similar_to(&self, word: &str, threshold: usize) -> Vec<Similar<'_>> {
        let mut found = Vec::new();
        if self.nodes.is_empty() {
            return found;
        }

        let mut queue = VecDeque::from([NodeId(0)]);
        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.index()];
            let distance = self.metric.distance(&node.word, word);
            if distance <= threshold {
                found.push(Similar {
                    word: &node.word,
                    distance,
                });
            }
            let low = distance.saturating_sub(threshold).max(1);
            let high = distance + threshold;
            queue.extend(node.children.range(low..=high).map(|(_, &child)| child));
        }
        found
    }

    /// [`BkTree::similar_to`] with the tree's own threshold.
    pub fn similar(&self, word: &str) -> Vec<Similar<'_>> {
        self.similar_to(word, self.threshold)
    }

    /// The nearest stored word within `threshold`, ties broken by lexicographic order.
    pub fn closest(&self, word: &str, threshold: usize) -> Option<Similar<'_>> {
        self.similar_to(word, threshold)
            .into_iter()
            .min_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.word.cmp(b.word)))
    }

    /// Breadth-first walk over the stored words.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        if !self.nodes.is_empty() {
            queue.push_back(NodeId(0));
        }
        std::iter::from_fn(move || {
            let id = queue.pop_front()?;
            let node = &self.nodes[id.index()];
            queue.extend(node.children.values().copied());
            Some(node.word.as_str())
        })
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Removal is not supported; see the module docs.
    pub fn remove(&mut self, _word: &str) -> Result<bool, TreeError> {
        Err(TreeError::UnsupportedOperation("remove"))
    }

    fn push_node(&mut self, word: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            word: word.to_owned(),
            children: BTreeMap::new(),
        });
        id
    }
}

fn validate_threshold(threshold: i64) -> Result<usize, TreeError> {
    usize::try_from(threshold).map_err(|_| TreeError::InvalidArgument(threshold))
}

impl<M: Metric, S: AsRef<str>> Extend<S> for BkTree<M> {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for word in iter {
            self.insert(word.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for BkTree<Levenshtein> {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tree = BkTree::default();
        tree.extend(iter);
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::levenshtein;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const MENU: &[&str] = &[
        "pizza", "pasta", "salad", "soup", "sushi", "burger", "pizzeria", "potato", "tomato",
        "risotto", "ravioli", "salmon", "steak",
    ];

    fn menu_tree() -> BkTree {
        MENU.iter().collect()
    }

    fn words(found: &[Similar<'_>]) -> HashSet<String> {
        found.iter().map(|s| s.word.to_string()).collect()
    }

    #[test]
    fn empty_tree_answers_nothing() {
        let tree = BkTree::default();
        assert!(tree.is_empty());
        assert!(!tree.contains("pizza"));
        assert!(tree.similar_to("pizza", 5).is_empty());
        assert_eq!(tree.iter().count(), 0);
    }

    #[test]
    fn first_insert_becomes_root() {
        let mut tree = BkTree::default();
        assert!(tree.insert("pizza"));
        assert_eq!(tree.iter().next(), Some("pizza"));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut tree = menu_tree();
        let before = tree.len();
        assert!(!tree.insert("salad"));
        assert_eq!(tree.len(), before);
        assert!(tree.contains("salad"));
    }

    #[test]
    fn contains_only_stored_words() {
        let tree = menu_tree();
        for word in MENU {
            assert!(tree.contains(word), "{word} should be present");
        }
        assert!(!tree.contains("pzza"));
        assert!(!tree.contains("piz"));
        assert!(!tree.contains(""));
    }

    #[test]
    fn similar_respects_radius() {
        let tree = menu_tree();
        let found = tree.similar_to("pzza", 1);
        assert_eq!(words(&found), HashSet::from(["pizza".to_string()]));
        assert_eq!(found[0].distance, 1);

        let wider = words(&tree.similar_to("pasta", 3));
        assert!(wider.contains("pasta"));
        assert!(wider.contains("pizza"));
        assert!(!wider.contains("risotto"));
    }

    #[test]
    fn similar_uses_stored_threshold() {
        let mut tree = menu_tree();
        tree.set_threshold(0).unwrap();
        assert_eq!(words(&tree.similar("pizza")), HashSet::from(["pizza".to_string()]));
        tree.set_threshold(1).unwrap();
        assert_eq!(tree.threshold(), 1);
        assert!(words(&tree.similar("sup")).contains("soup"));
    }

    #[test]
    fn closest_breaks_ties_lexicographically() {
        let tree: BkTree = ["cat", "bat", "hat"].iter().collect();
        let best = tree.closest("at", 1).unwrap();
        assert_eq!(best.word, "bat");
        assert_eq!(best.distance, 1);
        assert!(tree.closest("zzzzzz", 2).is_none());
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let mut tree = BkTree::default();
        assert_eq!(tree.set_threshold(-1), Err(TreeError::InvalidArgument(-1)));
        assert_eq!(tree.threshold(), DEFAULT_THRESHOLD);
        assert!(BkTree::with_threshold(Levenshtein, -3).is_err());
        assert!(BkTree::with_threshold(Levenshtein, 4).is_ok());
    }

    #[test]
    fn remove_is_unsupported() {
        let mut tree = menu_tree();
        assert_eq!(
            tree.remove("pizza"),
            Err(TreeError::UnsupportedOperation("remove"))
        );
        assert!(tree.contains("pizza"));
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut tree = menu_tree();
        tree.clear();
        assert!(tree.is_empty());
        assert!(!tree.contains("pizza"));
        assert!(tree.insert("soup"));
        assert!(tree.contains("soup"));
    }

    #[test]
    fn iter_visits_every_word_once() {
        let tree = menu_tree();
        let mut seen: Vec<_> = tree.iter().collect();
        seen.sort_unstable();
        let mut expected = MENU.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    proptest! {
        #[test]
        fn inserted_words_are_never_lost(list in vec("[a-f]{1,7}", 1..60)) {
            let mut tree = BkTree::default();
            for word in &list {
                tree.insert(word);
                prop_assert!(tree.contains(word));
            }
            for word in &list {
                prop_assert!(tree.contains(word));
            }
            let distinct: HashSet<_> = list.iter().collect();
            prop_assert_eq!(tree.len(), distinct.len());
        }

        #[test]
        fn radius_search_matches_linear_scan(
            list in vec("[a-e]{1,6}", 1..50),
            probe in "[a-e]{0,6}",
            radius in 0usize..4,
        ) {
            let tree: BkTree = list.iter().collect();
            let expected: HashSet<String> = list
                .iter()
                .filter(|w| levenshtein(w, &probe) <= radius)
                .cloned()
                .collect();
            prop_assert_eq!(words(&tree.similar_to(&probe, radius)), expected);
        }

        #[test]
        fn search_is_symmetric(list in vec("[a-d]{1,5}", 2..30), radius in 0usize..3) {
            let tree: BkTree = list.iter().collect();
            for a in &list {
                for b in &list {
                    if levenshtein(a, b) <= radius {
                        prop_assert!(words(&tree.similar_to(a, radius)).contains(b));
                        prop_assert!(words(&tree.similar_to(b, radius)).contains(a));
                    }
                }
            }
        }
    }
}

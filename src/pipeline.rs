//! Query preprocessing: split, denoise, stem, correct.
//!
//! A [`TokenPipeline`] is immutable configuration shared by every request. Calling
//! [`TokenPipeline::tokens`] creates the only per-query state, a queue of raw tokens that is
//! drained lazily through the stages in order. A stop word is dropped at the denoise stage and
//! never reaches stemming or correction.

use std::collections::HashSet;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use rust_stemmers::{Algorithm, Stemmer as Snowball};
use tracing::debug;

use crate::error::QueryError;
use crate::index::SearchIndex;

/// Characters that separate tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Delimiters {
    /// Every non-alphabetic character: whitespace, punctuation (`«`, `»`, `№` included),
    /// digits and symbols.
    #[default]
    Standard,
    /// Exactly the given characters.
    Chars(Vec<char>),
}

impl Delimiters {
    pub fn is_delimiter(&self, c: char) -> bool {
        match self {
            Delimiters::Standard => !c.is_alphabetic(),
            Delimiters::Chars(chars) => chars.contains(&c),
        }
    }

    /// Lower-cases and trims `text`, then splits it into non-empty tokens.
    pub fn split(&self, text: &str) -> Vec<String> {
        text.trim()
            .to_lowercase()
            .split(|c| self.is_delimiter(c))
            .filter(|token| !token.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Low-information words removed before any other stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopWords(HashSet<String>);

impl StopWords {
    /// Parses whitespace-separated words.
    pub fn from_text(text: &str) -> Self {
        text.split_whitespace().collect()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for StopWords {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
        )
    }
}

/// Maps a word to its root form. The algorithm is opaque to the pipeline.
#[derive(Clone, Default)]
pub enum Stemmer {
    #[default]
    Identity,
    /// Snowball English (Porter2).
    English,
    /// Snowball Russian.
    Russian,
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Stemmer {
    pub fn custom(stem: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Stemmer::Custom(Arc::new(stem))
    }

    pub fn stem(&self, word: &str) -> String {
        match self {
            Stemmer::Identity => word.to_owned(),
            Stemmer::English => snowball(Algorithm::English, word),
            Stemmer::Russian => snowball(Algorithm::Russian, word),
            Stemmer::Custom(stem) => stem(word),
        }
    }
}

impl fmt::Debug for Stemmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stemmer::Identity => write!(f, "Identity"),
            Stemmer::English => write!(f, "English"),
            Stemmer::Russian => write!(f, "Russian"),
            Stemmer::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

fn snowball(algorithm: Algorithm, word: &str) -> String {
    Snowball::create(algorithm).stem(word).into_owned()
}

/// Rejects tokens that are too short or outside the dataset's alphabet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordFilter {
    pub min_chars: usize,
    pub ascii_alphabetic: bool,
}

impl WordFilter {
    pub fn accepts(&self, word: &str) -> bool {
        word.chars().count() >= self.min_chars
            && (!self.ascii_alphabetic || word.chars().all(|c| c.is_ascii_alphabetic()))
    }
}

/// Replaces unknown words with their nearest vocabulary word.
#[derive(Clone)]
pub struct SpellCorrector {
    index: Arc<SearchIndex>,
    radius: usize,
}

impl SpellCorrector {
    /// Corrects within the radius configured on the index's metric tree.
    pub fn new(index: Arc<SearchIndex>) -> Self {
        let radius = index.tree().threshold();
        Self { index, radius }
    }

    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = radius;
        self
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Known words and stop words pass through untouched. Anything else becomes the closest
    /// vocabulary word (smallest distance, then lexicographically first), or fails.
    pub fn correct(&self, word: &str) -> Result<String, QueryError> {
        if self.index.contains_word(word) || self.index.stop_words().contains(word) {
            return Ok(word.to_owned());
        }
        match self.index.tree().closest(word, self.radius) {
            Some(hit) => {
                debug!(from = word, to = hit.word, distance = hit.distance, "corrected token");
                Ok(hit.word.to_owned())
            }
            None => Err(QueryError::UnknownWord(word.to_owned())),
        }
    }
}

impl fmt::Debug for SpellCorrector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpellCorrector")
            .field("vocabulary", &self.index.vocabulary_len())
            .field("radius", &self.radius)
            .finish()
    }
}

/// One transform applied to every token that survived the previous ones.
#[derive(Debug, Clone)]
pub enum Stage {
    Denoise(Arc<StopWords>),
    Filter(WordFilter),
    Stem(Stemmer),
    Correct(SpellCorrector),
}

impl Stage {
    /// `Ok(None)` drops the token.
    pub fn apply(&self, word: String) -> Result<Option<String>, QueryError> {
        match self {
            Stage::Denoise(stop_words) => Ok((!stop_words.contains(&word)).then_some(word)),
            Stage::Filter(filter) => Ok(filter.accepts(&word).then_some(word)),
            Stage::Stem(stemmer) => Ok(Some(stemmer.stem(&word))),
            Stage::Correct(corrector) => corrector.correct(&word).map(Some),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenPipeline {
    delimiters: Delimiters,
    stages: Vec<Stage>,
}

impl TokenPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Lazily processed tokens of `query`. Each item is a surviving token or the error that
    /// stopped it; iteration may continue past an error.
    pub fn tokens(&self, query: &str) -> Tokens<'_> {
        Tokens {
            raw: self.delimiters.split(query).into_iter(),
            stages: &self.stages,
        }
    }

    /// Every surviving token, failing on the first error.
    pub fn collect(&self, query: &str) -> Result<Vec<String>, QueryError> {
        self.tokens(query).collect()
    }
}

/// Single-pass token stream produced by [`TokenPipeline::tokens`].
#[derive(Debug)]
pub struct Tokens<'a> {
    raw: std::vec::IntoIter<String>,
    stages: &'a [Stage],
}

impl Iterator for Tokens<'_> {
    type Item = Result<String, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        'tokens: for raw in self.raw.by_ref() {
            let mut word = raw;
            for stage in self.stages {
                match stage.apply(word) {
                    Ok(Some(next)) => word = next,
                    Ok(None) => continue 'tokens,
                    Err(err) => return Some(Err(err)),
                }
            }
            return Some(Ok(word));
        }
        None
    }
}

impl FusedIterator for Tokens<'_> {}

/// Assembles the stages in their fixed order: denoise, filters, stem, correct.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    delimiters: Delimiters,
    stop_words: Option<Arc<StopWords>>,
    filters: Vec<WordFilter>,
    stemmer: Stemmer,
    corrector: Option<SpellCorrector>,
}

impl PipelineBuilder {
    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn stop_words(mut self, stop_words: Arc<StopWords>) -> Self {
        self.stop_words = Some(stop_words);
        self
    }

    pub fn filter(mut self, filter: WordFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn stemmer(mut self, stemmer: Stemmer) -> Self {
        self.stemmer = stemmer;
        self
    }

    pub fn corrector(mut self, corrector: SpellCorrector) -> Self {
        self.corrector = Some(corrector);
        self
    }

    pub fn build(self) -> TokenPipeline {
        let mut stages = Vec::new();
        if let Some(stop_words) = self.stop_words {
            stages.push(Stage::Denoise(stop_words));
        }
        stages.extend(self.filters.into_iter().map(Stage::Filter));
        if !matches!(self.stemmer, Stemmer::Identity) {
            stages.push(Stage::Stem(self.stemmer));
        }
        if let Some(corrector) = self.corrector {
            stages.push(Stage::Correct(corrector));
        }
        TokenPipeline {
            delimiters: self.delimiters,
            stages,
        }
    }
}

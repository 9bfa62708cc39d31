//! Delimited menu datasets and stop-word lists.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{Dish, Location, Restaurant};
use crate::error::ConfigError;
use crate::pipeline::{Stemmer, StopWords, WordFilter};

/// Field layout and language rules of a dataset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    /// `name|description|lat|lon|dish|price`
    #[default]
    English,
    /// `id|dish|price|name|description|address`
    Russian,
}

impl Schema {
    pub fn field_count(self) -> usize {
        6
    }

    /// Which description words are worth indexing.
    pub fn word_filter(self) -> WordFilter {
        match self {
            Schema::English => WordFilter {
                min_chars: 3,
                ascii_alphabetic: true,
            },
            Schema::Russian => WordFilter {
                min_chars: 3,
                ascii_alphabetic: false,
            },
        }
    }

    pub fn stemmer(self) -> Stemmer {
        match self {
            Schema::English => Stemmer::English,
            Schema::Russian => Stemmer::Russian,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::English => write!(f, "english"),
            Schema::Russian => write!(f, "russian"),
        }
    }
}

impl FromStr for Schema {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Schema::English),
            "russian" | "ru" => Ok(Schema::Russian),
            other => Err(ConfigError::UnknownSchema(other.to_owned())),
        }
    }
}

/// One dataset row: a dish offered by a restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub restaurant: Restaurant,
    pub dish: String,
    pub price: f64,
}

impl Record {
    pub fn new(restaurant: Restaurant, dish: impl Into<String>, price: f64) -> Self {
        Self {
            restaurant,
            dish: dish.into(),
            price,
        }
    }
}

fn non_empty(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_owned())
}

/// Parses one line. Returns `None` when it has fewer fields than the schema needs.
pub fn parse_line(schema: Schema, line: &str, separator: &str) -> Option<Record> {
    let fields: Vec<&str> = line.split(separator).collect();
    if fields.len() < schema.field_count() {
        return None;
    }
    let record = match schema {
        Schema::English => {
            let description = non_empty(fields[1]);
            let location = Location::parse(fields[2], fields[3], description.as_deref());
            Record::new(
                Restaurant::new(fields[0].trim(), description, location),
                fields[4].trim(),
                Dish::parse_price(fields[5]),
            )
        }
        Schema::Russian => {
            let location = non_empty(fields[5]).map_or(Location::NONE, Location::described);
            Record::new(
                Restaurant::new(fields[3].trim(), non_empty(fields[4]), location),
                fields[1].trim(),
                Dish::parse_price(fields[2]),
            )
        }
    };
    Some(record)
}

fn read(path: &Path, what: &'static str) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingPath {
            what,
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads every well-formed row. Blank lines are ignored; short lines are skipped with a warning.
pub fn load_dataset(
    path: &Path,
    schema: Schema,
    separator: &str,
) -> Result<Vec<Record>, ConfigError> {
    let text = read(path, "dataset")?;
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(schema, line, separator) {
            Some(record) => records.push(record),
            None => {
                skipped += 1;
                warn!(path = %path.display(), line = number + 1, "skipping malformed dataset line");
            }
        }
    }
    info!(
        path = %path.display(),
        %schema,
        records = records.len(),
        skipped,
        "Loaded dataset"
    );
    Ok(records)
}

pub fn load_stop_words(path: &Path) -> Result<StopWords, ConfigError> {
    let words = StopWords::from_text(&read(path, "stop words")?);
    info!(path = %path.display(), words = words.len(), "Loaded stop words");
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_english_rows() {
        let record = parse_line(
            Schema::English,
            "Luigi's|Family pizzeria|40.71|-74.0|Margherita Pizza|9.50",
            "|",
        )
        .unwrap();
        assert_eq!(record.restaurant.name, "Luigi's");
        assert_eq!(record.restaurant.description.as_deref(), Some("Family pizzeria"));
        assert_eq!(record.restaurant.location.lat, 40.71);
        assert_eq!(
            record.restaurant.location.description.as_deref(),
            Some("Family pizzeria")
        );
        assert_eq!(record.dish, "Margherita Pizza");
        assert_eq!(record.price, 9.5);
    }

    #[test]
    fn bad_numbers_fall_back_to_sentinels() {
        let record = parse_line(Schema::English, "A|B|north|south|Soup|ask", "|").unwrap();
        assert!(!record.restaurant.location.is_known());
        assert!(record.price.is_nan());
    }

    #[test]
    fn parses_russian_rows() {
        let record = parse_line(
            Schema::Russian,
            "17;Борщ украинский;120;Пузата Хата;Столовая;Крещатик 15",
            ";",
        )
        .unwrap();
        assert_eq!(record.dish, "Борщ украинский");
        assert_eq!(record.price, 120.0);
        assert_eq!(record.restaurant.name, "Пузата Хата");
        assert_eq!(
            record.restaurant.location.description.as_deref(),
            Some("Крещатик 15")
        );
        let no_address = parse_line(Schema::Russian, "1;Чай;20;Кафе;;", ";").unwrap();
        assert_eq!(no_address.restaurant.location, Location::NONE);
        assert_eq!(no_address.restaurant.description, None);
    }

    #[test]
    fn short_lines_are_rejected() {
        assert!(parse_line(Schema::English, "only|three|fields", "|").is_none());
    }

    #[test]
    fn schema_names_round_trip() {
        assert_eq!("English".parse::<Schema>().unwrap(), Schema::English);
        assert_eq!("ru".parse::<Schema>().unwrap(), Schema::Russian);
        assert_eq!(Schema::Russian.to_string(), "russian");
        assert!(matches!(
            "klingon".parse::<Schema>(),
            Err(ConfigError::UnknownSchema(name)) if name == "klingon"
        ));
    }

    #[test]
    fn loads_dataset_skipping_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Luigi|Pizzeria|1.0|2.0|Pizza Margherita|9").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "broken line").unwrap();
        writeln!(file, "Mario|Trattoria|3.0|4.0|Pasta Carbonara|12").unwrap();

        let records = load_dataset(file.path(), Schema::English, "|").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].restaurant.name, "Mario");
    }

    #[test]
    fn missing_files_are_reported() {
        let err = load_dataset(Path::new("/nonexistent/dishes.psv"), Schema::English, "|")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingPath { what: "dataset", .. }));
        assert!(load_stop_words(Path::new("/nonexistent/stop.txt")).is_err());
    }

    #[test]
    fn loads_stop_words() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "the a\nand   with").unwrap();
        let words = load_stop_words(file.path()).unwrap();
        assert_eq!(words.len(), 4);
        assert!(words.contains("with"));
    }
}

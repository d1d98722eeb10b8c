//! Tweet sentiment: the label set, text cleaning, and a small lexicon classifier.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Sentiment label stored in the `sentiment` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// Polarity in `[-1, 1]` to a label: strictly positive and strictly negative scores are
    /// polar, exactly zero is neutral. NaN is treated as neutral.
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            Sentiment::Positive
        } else if polarity < 0.0 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text-sentiment collaborator.
pub trait Classify: Send + Sync {
    /// Polarity of `text` in `[-1, 1]`.
    fn polarity(&self, text: &str) -> f64;

    fn classify(&self, text: &str) -> Sentiment {
        Sentiment::from_polarity(self.polarity(&clean_tweet(text)))
    }
}

lazy_static::lazy_static! {
    // mentions, anything outside [0-9A-Za-z \t], and URLs
    static ref NOISE: Regex =
        Regex::new(r"(@[A-Za-z0-9]+)|([^0-9A-Za-z \t])|(\w+://\S+)").expect("valid noise regex");

    /// Word polarities in `[-1, 1]`.
    static ref LEXICON: HashMap<&'static str, f64> = {
        let mut map = HashMap::new();
        for (word, score) in [
            ("good", 0.7), ("great", 0.8), ("excellent", 1.0), ("best", 1.0), ("better", 0.5),
            ("love", 0.5), ("amazing", 0.6), ("awesome", 1.0), ("nice", 0.6), ("happy", 0.8),
            ("strong", 0.4), ("bullish", 0.6), ("rising", 0.3), ("rise", 0.3), ("rises", 0.3),
            ("gain", 0.4), ("gains", 0.4), ("up", 0.1), ("surge", 0.5), ("surging", 0.5),
            ("rally", 0.5), ("soar", 0.6), ("soaring", 0.6), ("win", 0.8), ("profit", 0.4),
            ("buy", 0.2), ("opportunity", 0.3), ("clean", 0.4), ("safe", 0.5), ("growth", 0.4),
            ("bad", -0.7), ("worse", -0.4), ("worst", -1.0), ("terrible", -1.0), ("awful", -1.0),
            ("hate", -0.8), ("poor", -0.4), ("weak", -0.4), ("bearish", -0.6), ("falling", -0.3),
            ("fall", -0.3), ("falls", -0.3), ("drop", -0.3), ("drops", -0.3), ("crash", -0.7),
            ("loss", -0.4), ("losses", -0.4), ("down", -0.2), ("sell", -0.2), ("risk", -0.3),
            ("dangerous", -0.6), ("disaster", -0.8), ("fear", -0.5), ("scam", -0.8),
            ("dump", -0.5), ("collapse", -0.7), ("sad", -0.5), ("wrong", -0.5),
        ] {
            map.insert(word, score);
        }
        map
    };
}

const NEGATIONS: [&str; 10] = [
    "not", "no", "never", "dont", "isnt", "cant", "wont", "doesnt", "didnt", "wasnt",
];

/// Removes mentions, URLs and special characters, collapsing whitespace.
pub fn clean_tweet(text: &str) -> String {
    NOISE
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Default classifier: the mean polarity of the lexicon words in the text. A negation
/// directly before a word flips and halves its score; text without lexicon words scores 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexiconClassifier;

impl Classify for LexiconClassifier {
    fn polarity(&self, text: &str) -> f64 {
        // cleaning leaves "don't" as "don t"; glue the "t" back on
        let mut words: Vec<String> = Vec::new();
        for word in text.split_whitespace() {
            let word = word.to_lowercase().replace('\'', "");
            match words.last_mut() {
                Some(last) if word == "t" && last.ends_with('n') => last.push('t'),
                _ => words.push(word),
            }
        }

        let scores: Vec<f64> = words
            .iter()
            .enumerate()
            .filter_map(|(i, word)| {
                let score = *LEXICON.get(word.as_str())?;
                let negated = i > 0 && NEGATIONS.contains(&words[i - 1].as_str());
                Some(if negated { -0.5 * score } else { score })
            })
            .collect();

        if scores.is_empty() {
            return 0.0;
        }
        (scores.iter().sum::<f64>() / scores.len() as f64).clamp(-1.0, 1.0)
    }
}

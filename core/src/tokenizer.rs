use crate::config::EngineConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        // Contractions appear without apostrophes: cleaning strips them before lookup.
        let words: &[&str] = &[
            "i","me","my","myself","we","our","ours","ourselves","you","youre","youve","youll","youd","your","yours","yourself","yourselves",
            "he","him","his","himself","she","shes","her","hers","herself","it","its","itself","they","them","their","theirs","themselves",
            "what","which","who","whom","this","that","thatll","these","those",
            "am","is","are","was","were","be","been","being","have","has","had","having","do","does","did","doing",
            "a","an","the","and","but","if","or","because","as","until","while","of","at","by","for","with","about","against",
            "between","into","through","during","before","after","above","below","to","from","up","down","in","out","on","off",
            "over","under","again","further","then","once","here","there","when","where","why","how",
            "all","any","both","each","few","more","most","other","some","such","no","nor","not","only","own","same","so","than",
            "too","very","s","t","can","will","just","don","dont","should","shouldve","now","d","ll","m","o","re","ve","y",
            "ain","aren","arent","couldn","couldnt","didn","didnt","doesn","doesnt","hadn","hadnt","hasn","hasnt","haven","havent",
            "isn","isnt","ma","mightn","mightnt","mustn","mustnt","needn","neednt","shan","shant","shouldn","shouldnt",
            "wasn","wasnt","weren","werent","won","wont","wouldn","wouldnt"
        ];
        words.iter().copied().collect()
    };
    static ref DEFAULT_NORMALIZER: Normalizer = Normalizer::default();
}

/// Per-token normalization with the default category table.
pub fn normalize(token: &str) -> String {
    DEFAULT_NORMALIZER.normalize(token)
}

/// Lowercase and drop every character that is not an ASCII letter or digit.
pub fn clean(token: &str) -> String {
    NON_ALNUM.replace_all(&token.to_lowercase(), "").into_owned()
}

/// Reduce a cleaned token to its base form ("running" -> "run").
pub fn lemmatize(cleaned: &str) -> String {
    STEMMER.stem(cleaned).into_owned()
}

/// Token normalizer: clean, substitute semantic categories, lemmatize.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// member token -> lemmatized category label
    categories: HashMap<String, String>,
    custom_stop_words: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &EngineConfig) -> Self {
        let mut categories = HashMap::new();
        if config.semantic_categories {
            for (label, members) in &config.categories {
                // a substituted label is lemmatized like any other token
                let label = lemmatize(&clean(label));
                for member in members {
                    categories.entry(clean(member)).or_insert_with(|| label.clone());
                }
            }
        }
        let custom_stop_words = config.custom_stop_words.iter().map(|w| clean(w)).collect();
        Self { categories, custom_stop_words }
    }

    /// Normalize one whitespace-delimited token. An empty result means "drop".
    pub fn normalize(&self, token: &str) -> String {
        self.normalize_cleaned(clean(token))
    }

    fn normalize_cleaned(&self, cleaned: String) -> String {
        if cleaned.is_empty() {
            return cleaned;
        }
        if let Some(label) = self.categories.get(&cleaned) {
            return label.clone();
        }
        lemmatize(&cleaned)
    }

    pub fn is_stopword(&self, term: &str) -> bool {
        STOPWORDS.contains(term) || self.custom_stop_words.contains(term)
    }

    /// Normalize `token` and apply the stop-word filter, as the vocabulary builder does.
    ///
    /// Only the normalized form is checked against the stop-word sets.
    pub fn term(&self, token: &str) -> Option<String> {
        let term = self.normalize(token);
        if term.is_empty() || self.is_stopword(&term) {
            None
        } else {
            Some(term)
        }
    }

    /// Split on whitespace and normalize every token, skipping empty results.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.split_whitespace()
            .map(move |token| self.normalize(token))
            .filter(|term| !term.is_empty())
    }
}

use crate::tokenizer::Normalizer;
use std::collections::HashMap;

/// Count vector of `raw_text` aligned to `terms`.
///
/// Every normalized token is counted, then each vocabulary term takes its
/// count (0 if absent). Tokens outside the vocabulary are ignored.
pub fn vectorize(raw_text: &str, normalizer: &Normalizer, terms: &[String]) -> Vec<u32> {
    let mut tf: HashMap<String, u32> = HashMap::new();
    for term in normalizer.tokens(raw_text) {
        *tf.entry(term).or_insert(0) += 1;
    }
    terms.iter().map(|term| tf.get(term).copied().unwrap_or(0)).collect()
}

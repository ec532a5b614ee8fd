//! Tokenization capability boundary. Out of scope per the spec beyond this
//! interface — a real deployment would load a BPE/SentencePiece vocabulary;
//! this crate only needs a thin trait at the CLI/prompt-loading seam.

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;
}

/// Reference tokenizer for tests and the bundled `ArithmeticModel` backend:
/// splits on whitespace and maps each distinct word to a stable id,
/// allocated in first-seen order. Not meant to reflect any real vocabulary.
pub struct WhitespaceTokenizer {
    vocab: std::sync::Mutex<Vec<String>>,
}

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for WhitespaceTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        let mut vocab = self.vocab.lock().unwrap();
        text.split_whitespace()
            .map(|word| {
                if let Some(idx) = vocab.iter().position(|w| w == word) {
                    idx as u32
                } else {
                    vocab.push(word.to_string());
                    (vocab.len() - 1) as u32
                }
            })
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> String {
        let vocab = self.vocab.lock().unwrap();
        tokens
            .iter()
            .map(|&t| vocab.get(t as usize).cloned().unwrap_or_else(|| "<unk>".to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_stable_across_repeats() {
        let tokenizer = WhitespaceTokenizer::new();
        let first = tokenizer.encode("hello world hello");
        assert_eq!(first, vec![0, 1, 0]);
    }

    #[test]
    fn decode_round_trips() {
        let tokenizer = WhitespaceTokenizer::new();
        let tokens = tokenizer.encode("the quick fox");
        assert_eq!(tokenizer.decode(&tokens), "the quick fox");
    }
}

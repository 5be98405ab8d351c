use std::collections::HashMap;
use std::path::Path;

use crate::artifacts;
use crate::errors::Result;

pub const PAD_TOKEN: &str = "<PAD>";
pub const UNK_TOKEN: &str = "<UNK>";
pub const BOS_TOKEN: &str = "<BOS>";
pub const EOS_TOKEN: &str = "<EOS>";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

pub(crate) const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, BOS_TOKEN, EOS_TOKEN];

/// Word-level tokenizer with reserved special tokens.
///
/// Ids are dense: the four special tokens occupy 0..4 and corpus words are
/// assigned increasing ids in first-seen order starting at 4.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    word_to_id: HashMap<String, u32>,
    id_to_word: Vec<String>,
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WordTokenizer {
    /// Create a tokenizer holding only the special tokens.
    pub fn new() -> Self {
        let id_to_word: Vec<String> = SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect();
        let word_to_id = id_to_word
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self {
            word_to_id,
            id_to_word,
        }
    }

    /// Build a vocabulary from a corpus of texts.
    pub fn from_texts<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokenizer = Self::new();
        tokenizer.extend_vocab(texts);
        tokenizer
    }

    /// Add every unseen word of `texts` to the vocabulary, in first-seen
    /// order. Already-known words keep their ids.
    pub fn extend_vocab<'a, I>(&mut self, texts: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for text in texts {
            for word in text.split_whitespace() {
                if !self.word_to_id.contains_key(word) {
                    let id = self.id_to_word.len() as u32;
                    self.word_to_id.insert(word.to_string(), id);
                    self.id_to_word.push(word.to_string());
                }
            }
        }
    }

    /// Number of entries in the vocabulary, special tokens included.
    pub fn vocab_size(&self) -> usize {
        self.id_to_word.len()
    }

    /// Id for `word`, if present.
    pub fn id_of(&self, word: &str) -> Option<u32> {
        self.word_to_id.get(word).copied()
    }

    /// Word for `id`, if in range.
    pub fn word_of(&self, id: u32) -> Option<&str> {
        self.id_to_word.get(id as usize).map(String::as_str)
    }

    /// Encode text to token ids; unknown words map to `<UNK>`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace()
            .map(|word| self.word_to_id.get(word).copied().unwrap_or(UNK_ID))
            .collect()
    }

    /// Encode text and wrap the result in `<BOS>`/`<EOS>` markers.
    pub fn encode_with_specials(&self, text: &str) -> Vec<u32> {
        let mut ids = Vec::with_capacity(text.split_whitespace().count() + 2);
        ids.push(BOS_ID);
        ids.extend(self.encode(text));
        ids.push(EOS_ID);
        ids
    }

    /// Decode token ids back to a space-joined string; ids outside the
    /// vocabulary render as `<UNK>`.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .map(|&id| self.word_of(id).unwrap_or(UNK_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Id-ordered view of the vocabulary.
    pub(crate) fn words(&self) -> &[String] {
        &self.id_to_word
    }

    pub(crate) fn from_words(words: Vec<String>) -> Self {
        let word_to_id = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self {
            word_to_id,
            id_to_word: words,
        }
    }

    /// Persist the vocabulary as a JSON artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        artifacts::save_vocab(self, path.as_ref())
    }

    /// Load a vocabulary previously written by [`WordTokenizer::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        artifacts::load_vocab(path.as_ref())
    }
}

//! Word-level tokenizer for the transformer project.
//!
//! This crate exposes a minimal surface for building a whitespace word
//! vocabulary and mapping text to integer ids. Four special tokens occupy
//! fixed small ids assigned before any corpus-derived word: `<PAD>` (0),
//! `<UNK>` (1), `<BOS>` (2), and `<EOS>` (3). Unknown words encode to
//! `<UNK>`, and decoding renders unknown ids as the `<UNK>` literal rather
//! than failing.
//!
//! Vocabularies can be persisted to a JSON artifact and reloaded; loading
//! validates that the reserved prefix is intact before accepting a file.

pub mod errors;

mod artifacts;
mod word;

pub use errors::{Error, Result};
pub use word::{
    WordTokenizer, BOS_ID, BOS_TOKEN, EOS_ID, EOS_TOKEN, PAD_ID, PAD_TOKEN, UNK_ID, UNK_TOKEN,
};

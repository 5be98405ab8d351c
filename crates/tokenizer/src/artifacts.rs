use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::word::{WordTokenizer, SPECIAL_TOKENS};

/// On-disk vocabulary artifact: the id-ordered word list plus a format tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabArtifact {
    format: String,
    words: Vec<String>,
}

const FORMAT: &str = "word-vocab-v1";

pub(crate) fn save_vocab(tokenizer: &WordTokenizer, path: &Path) -> Result<()> {
    let artifact = VocabArtifact {
        format: FORMAT.to_string(),
        words: tokenizer.words().to_vec(),
    };
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &artifact)?;
    log::debug!(
        "wrote vocabulary artifact with {} entries to {}",
        artifact.words.len(),
        path.display()
    );
    Ok(())
}

pub(crate) fn load_vocab(path: &Path) -> Result<WordTokenizer> {
    let file = File::open(path)?;
    let artifact: VocabArtifact = serde_json::from_reader(BufReader::new(file))?;

    if artifact.format != FORMAT {
        return Err(Error::Artifact(format!(
            "unexpected vocabulary format {:?}, expected {FORMAT:?}",
            artifact.format
        )));
    }
    if artifact.words.len() < SPECIAL_TOKENS.len() {
        return Err(Error::Artifact(format!(
            "vocabulary holds {} entries, fewer than the {} reserved tokens",
            artifact.words.len(),
            SPECIAL_TOKENS.len()
        )));
    }
    for (i, expected) in SPECIAL_TOKENS.iter().enumerate() {
        if artifact.words[i] != *expected {
            return Err(Error::Artifact(format!(
                "reserved id {i} holds {:?}, expected {expected:?}",
                artifact.words[i]
            )));
        }
    }

    Ok(WordTokenizer::from_words(artifact.words))
}

//! Subword tokenizers consumed by the scoring harness.
//!
//! The harness only needs `encode` and `decode`; anything that can provide
//! them implements [`ModelTokenizer`].

pub mod hf;
pub mod symbol_vocab;

#[cfg(test)]
pub(crate) mod tests;

use anyhow::{Result, anyhow};
use std::fmt;
use std::path::{Path, PathBuf};

pub use hf::HfTokenizer;
pub use symbol_vocab::SymbolVocabTokenizer;

/// Text ↔ token-id capability.
///
/// `encode` must never emit the reserved sentinel ids for ordinary text.
pub trait ModelTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn kind(&self) -> TokenizerKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    HuggingFace,
    SymbolVocab,
    Other,
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerKind::HuggingFace => write!(f, "tokenizer.json"),
            TokenizerKind::SymbolVocab => write!(f, "vocab + symbol table"),
            TokenizerKind::Other => write!(f, "custom"),
        }
    }
}

pub const HF_TOKENIZER_FILE: &str = "tokenizer.json";
pub const DEFAULT_VOCAB_FILE: &str = "vocab.txt";
pub const DEFAULT_SYMBOL_FILE: &str = "emoji.json";

/// Explicit tokenizer file overrides; unset fields are resolved against the
/// model directory.
#[derive(Debug, Clone, Default)]
pub struct TokenizerFiles {
    pub vocab: Option<PathBuf>,
    pub symbols: Option<PathBuf>,
}

/// Pick and load the tokenizer for a model directory.
///
/// Order: explicit vocab + symbol table, then `tokenizer.json`, then
/// `vocab.txt` + `emoji.json` inside the model directory.
pub fn load_tokenizer(model_dir: &Path, files: &TokenizerFiles) -> Result<Box<dyn ModelTokenizer>> {
    match (&files.vocab, &files.symbols) {
        (Some(vocab), Some(symbols)) => {
            return Ok(Box::new(SymbolVocabTokenizer::from_files(vocab, symbols)?));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(anyhow!(
                "a vocabulary file and a symbol table must be given together"
            ));
        }
        (None, None) => {}
    }

    let hf_path = model_dir.join(HF_TOKENIZER_FILE);
    if hf_path.is_file() {
        return Ok(Box::new(HfTokenizer::from_file(&hf_path)?));
    }

    let vocab = model_dir.join(DEFAULT_VOCAB_FILE);
    let symbols = model_dir.join(DEFAULT_SYMBOL_FILE);
    if vocab.is_file() && symbols.is_file() {
        return Ok(Box::new(SymbolVocabTokenizer::from_files(&vocab, &symbols)?));
    }

    Err(anyhow!(
        "no tokenizer found in {:?}: expected {} or {} + {}",
        model_dir,
        HF_TOKENIZER_FILE,
        DEFAULT_VOCAB_FILE,
        DEFAULT_SYMBOL_FILE
    ))
}

//! Adapter over a HuggingFace `tokenizer.json`.

use anyhow::{Result, anyhow};
use std::path::Path;
use tokenizers::Tokenizer;

use super::{ModelTokenizer, TokenizerKind};

pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("failed to load tokenizer {:?}: {}", path, e))?;
        log::info!("loaded tokenizer.json ({} entries)", inner.get_vocab_size(true));
        Ok(Self::new(inner))
    }

    /// Wrap an already-built tokenizer. Truncation and padding are switched
    /// off: sequence layout is owned by the sequence builder.
    pub fn new(mut inner: Tokenizer) -> Self {
        let _ = inner.with_truncation(None);
        inner.with_padding(None);
        Self { inner }
    }
}

impl ModelTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("tokenization failed: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| anyhow!("decoding failed: {}", e))
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::HuggingFace
    }
}

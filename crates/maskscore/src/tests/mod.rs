// Shared stubs for the end-to-end scoring tests.


use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use ndarray::Array2;

use crate::batch::ScoringBatch;
use crate::inference::MaskedLmInference;
use crate::tokenizer::{ModelTokenizer, TokenizerKind};

pub const VOCAB_SIZE: usize = 100;
pub const MAX_SEQ_LENGTH: usize = 10;

/// `a` → 5, `b` → 6, ..., `z` → 30.
pub struct LetterTokenizer;

impl ModelTokenizer for LetterTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text
            .chars()
            .filter(|c| c.is_ascii_lowercase())
            .map(|c| c as u32 - 'a' as u32 + 5)
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(ids
            .iter()
            .filter_map(|&id| char::from_u32(id + 'a' as u32 - 5))
            .collect())
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Other
    }
}

/// Every output row gives each id a fixed score from `table`, and
/// `default` to everything else. Counts its calls.
pub struct TableModel {
    table: HashMap<u32, f32>,
    default: f32,
    calls: AtomicUsize,
}

impl TableModel {
    pub fn new(entries: &[(u32, f32)]) -> Self {
        Self {
            table: entries.iter().copied().collect(),
            default: -10.0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MaskedLmInference for TableModel {
    fn infer(&self, batch: &ScoringBatch) -> Result<Array2<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = batch.num_segments() * batch.position_width();
        Ok(Array2::from_shape_fn((rows, VOCAB_SIZE), |(_, v)| {
            self.table.get(&(v as u32)).copied().unwrap_or(self.default)
        }))
    }

    fn vocab_size(&self) -> usize {
        VOCAB_SIZE
    }
}

impl<T: MaskedLmInference> MaskedLmInference for std::sync::Arc<T> {
    fn infer(&self, batch: &ScoringBatch) -> Result<Array2<f32>> {
        (**self).infer(batch)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn max_seq_length(&self) -> Option<usize> {
        (**self).max_seq_length()
    }
}

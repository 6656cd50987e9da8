//! The masked-language inference capability.

pub mod bert;

use anyhow::Result;
use ndarray::Array2;

use crate::batch::ScoringBatch;

pub use bert::BertMaskedLm;

/// Anything that turns a scoring batch into per-position vocabulary
/// distributions.
///
/// The result has `num_segments * position_width` rows, segment-major, and
/// one column per vocabulary id. Values are log-probabilities.
pub trait MaskedLmInference: Send + Sync {
    fn infer(&self, batch: &ScoringBatch) -> Result<Array2<f32>>;

    fn vocab_size(&self) -> usize;

    /// Longest sequence the model accepts, when tighter than the
    /// configured `max_position_embeddings`.
    fn max_seq_length(&self) -> Option<usize> {
        None
    }
}

impl<T: MaskedLmInference + ?Sized> MaskedLmInference for Box<T> {
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

//! Reference CPU backend: a BERT / RoBERTa encoder with its masked-LM head,
//! restored from a safetensors checkpoint.

pub mod layers;
mod model;
pub mod weights;


pub use model::{BertMaskedLm, WeightLayout};
pub use weights::{CheckpointWeights, DEFAULT_CHECKPOINT, latest_checkpoint};

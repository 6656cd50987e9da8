//! Masked-span scoring for masked-language models.
//!
//! A context is split into segments, every segment is laid out as a
//! fixed-length `[CLS] content [EOT] [SEP]` sequence, all segments of one
//! context go through a single batched inference call, and the model's
//! log-probability for each observed content token becomes its score.
//!
//! Scores are reduced to per-context sums or rendered as annotated text.

pub mod batch;
pub mod config;
pub mod engine;
pub mod inference;
pub mod output;
pub mod scorer;
pub mod sequence;
pub mod special;
pub mod splitter;
pub mod tokenizer;

#[cfg(test)]
mod tests;

pub use crate::{
    batch::ScoringBatch,
    config::{Device, ModelConfig, OutputMode, ScoreOptions},
    engine::{ScoreEngine, ScoreRecord, TokenScore},
    inference::{BertMaskedLm, MaskedLmInference},
    output::{ContextScore, OutputFormatter},
    scorer::Scorer,
    sequence::TokenSequence,
    special::SpecialTokens,
    tokenizer::{ModelTokenizer, TokenizerFiles, TokenizerKind, load_tokenizer},
};

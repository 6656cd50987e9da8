//! Batched inference and per-token score extraction.

use anyhow::{Result, anyhow, bail};
use ndarray::{Array2, ArrayView1};

use crate::batch::ScoringBatch;
use crate::config::ModelConfig;
use crate::inference::MaskedLmInference;
use crate::sequence::{TokenSequence, build_sequence};
use crate::special::SpecialTokens;
use crate::splitter::split_segments;
use crate::tokenizer::ModelTokenizer;

/// Score of one content position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenScore {
    /// Model output at this position for the observed token.
    pub score: f32,
    pub actual: u32,
    /// Arg-max vocabulary id at this position.
    pub predicted: u32,
}

/// Scores of one segment, in position order, ending before the first
/// sentinel or padding id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreRecord {
    pub tokens: Vec<TokenScore>,
}

impl ScoreRecord {
    pub fn sum(&self) -> f32 {
        self.tokens.iter().map(|t| t.score).sum()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Owns the inference model and tokenizer for a run and scores contexts
/// one batch at a time.
pub struct ScoreEngine {
    model: Box<dyn MaskedLmInference>,
    tokenizer: Box<dyn ModelTokenizer>,
    special: SpecialTokens,
    max_seq_length: usize,
}

impl ScoreEngine {
    pub fn new(
        model: Box<dyn MaskedLmInference>,
        tokenizer: Box<dyn ModelTokenizer>,
        config: &ModelConfig,
    ) -> Result<Self> {
        if model.vocab_size() != config.vocab_size {
            bail!(
                "model vocabulary ({}) does not match config vocab_size ({})",
                model.vocab_size(),
                config.vocab_size
            );
        }
        let max_seq_length = match model.max_seq_length() {
            Some(limit) if limit < config.max_seq_length() => {
                log::info!(
                    "model accepts {} positions, shortening sequences from {}",
                    limit,
                    config.max_seq_length()
                );
                limit
            }
            _ => config.max_seq_length(),
        };
        Ok(Self {
            model,
            tokenizer,
            special: config.special_tokens()?,
            max_seq_length,
        })
    }

    pub fn tokenizer(&self) -> &dyn ModelTokenizer {
        self.tokenizer.as_ref()
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn max_seq_length(&self) -> usize {
        self.max_seq_length
    }

    /// Build the batch for one context without running the model.
    pub fn prepare(&self, context: &str, split_tag: &str) -> Result<ScoringBatch> {
        let sequences = split_segments(context, split_tag)
            .into_iter()
            .map(|segment| {
                build_sequence(segment, self.tokenizer.as_ref(), &self.special, self.max_seq_length)
            })
            .collect::<Result<Vec<TokenSequence>>>()?;
        ScoringBatch::assemble(&sequences)
    }

    /// Split, batch and score one context with a single forward pass.
    pub fn score_context(&self, context: &str, split_tag: &str) -> Result<Vec<ScoreRecord>> {
        let batch = self.prepare(context, split_tag)?;
        let log_probs = self.model.infer(&batch)?;
        log::debug!(
            "inference for {} segments returned {:?}",
            batch.num_segments(),
            log_probs.dim()
        );
        extract_scores(&batch.input_ids, &log_probs, &self.special)
    }
}

/// Walk each segment from index 1 and read the model output for every
/// content id, stopping at the first id `>= EOT`.
///
/// Position `j` of every segment reads row `j` of `log_probs`: the model's
/// output rows form one flattened position dimension shared by the batch.
pub fn extract_scores(
    input_ids: &Array2<u32>,
    log_probs: &Array2<f32>,
    special: &SpecialTokens,
) -> Result<Vec<ScoreRecord>> {
    let mut records = Vec::with_capacity(input_ids.nrows());

    for (segment, ids) in input_ids.rows().into_iter().enumerate() {
        let mut tokens = Vec::new();
        for (j, &actual) in ids.iter().enumerate().skip(1) {
            if !special.is_content(actual) {
                break;
            }
            if j >= log_probs.nrows() {
                bail!(
                    "inference returned {} rows, position {} of segment {} needs more",
                    log_probs.nrows(),
                    j,
                    segment
                );
            }
            let dist = log_probs.row(j);
            let score = *dist.get(actual as usize).ok_or_else(|| {
                anyhow!(
                    "inference returned {} columns, token id {} is out of range",
                    dist.len(),
                    actual
                )
            })?;
            tokens.push(TokenScore {
                score,
                actual,
                predicted: argmax(dist),
            });
        }
        log::trace!("segment {}: scored {} positions", segment, tokens.len());
        records.push(ScoreRecord { tokens });
    }

    Ok(records)
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(dist: ArrayView1<f32>) -> u32 {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (i, &v) in dist.iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    best_idx as u32
}

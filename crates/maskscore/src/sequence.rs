//! Segment → fixed-length model input.

use anyhow::{Result, bail};

use crate::special::SpecialTokens;
use crate::tokenizer::ModelTokenizer;

/// Sentinels added around the content: CLS in front, EOT and SEP behind.
pub const RESERVED_POSITIONS: usize = 3;

pub const PAD_TOKEN_ID: u32 = 0;
pub const SEGMENT_TYPE_ID: u32 = 1;

/// One segment laid out as `[CLS] content.. [EOT] [SEP] 0..`, always
/// exactly `max_seq_length` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    pub token_ids: Vec<u32>,
    /// 1 for every non-padding position.
    pub input_mask: Vec<u32>,
    /// Constant 1, padding included.
    pub segment_ids: Vec<u32>,
}

impl TokenSequence {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Every position is scored, so this is `0..len`.
    pub fn positions(&self) -> Vec<u32> {
        (0..self.len() as u32).collect()
    }
}

/// Lay out already-encoded content, silently dropping trailing ids that do
/// not fit in front of the sentinels.
///
/// Expects `max_seq_length >= RESERVED_POSITIONS`; below that the sentinels
/// alone overflow and the result is longer than `max_seq_length`.
pub fn build_from_ids(
    content: &[u32],
    special: &SpecialTokens,
    max_seq_length: usize,
) -> TokenSequence {
    let keep = content
        .len()
        .min(max_seq_length.saturating_sub(RESERVED_POSITIONS));

    let mut token_ids = Vec::with_capacity(max_seq_length);
    token_ids.push(special.cls);
    token_ids.extend_from_slice(&content[..keep]);
    token_ids.push(special.eot);
    token_ids.push(special.sep);

    let mut input_mask = vec![1; token_ids.len()];
    let mut segment_ids = vec![SEGMENT_TYPE_ID; token_ids.len()];

    token_ids.resize(max_seq_length.max(token_ids.len()), PAD_TOKEN_ID);
    input_mask.resize(token_ids.len(), 0);
    segment_ids.resize(token_ids.len(), SEGMENT_TYPE_ID);

    TokenSequence {
        token_ids,
        input_mask,
        segment_ids,
    }
}

/// Encode a segment and lay it out.
pub fn build_sequence(
    segment: &str,
    tokenizer: &dyn ModelTokenizer,
    special: &SpecialTokens,
    max_seq_length: usize,
) -> Result<TokenSequence> {
    if max_seq_length < RESERVED_POSITIONS {
        bail!(
            "max_seq_length {} leaves no room for the {} sentinel positions",
            max_seq_length,
            RESERVED_POSITIONS
        );
    }
    let content = tokenizer.encode(segment)?;
    let sequence = build_from_ids(&content, special, max_seq_length);
    if content.len() + RESERVED_POSITIONS > max_seq_length {
        log::debug!(
            "truncated segment from {} to {} content tokens",
            content.len(),
            max_seq_length.saturating_sub(RESERVED_POSITIONS)
        );
    }
    Ok(sequence)
}

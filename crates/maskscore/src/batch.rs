//! Stacking one context's segments into model input tensors.

use anyhow::{Result, anyhow, bail};
use ndarray::{Array1, Array2};

use crate::sequence::TokenSequence;

/// All tensors for one inference call. Rows are segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringBatch {
    /// `[num_segments, max_seq_length]`
    pub input_ids: Array2<u32>,
    /// `[num_segments, max_seq_length]`
    pub input_mask: Array2<u32>,
    /// `[num_segments, max_seq_length]`
    pub segment_ids: Array2<u32>,
    /// `[num_segments, position_width]`, right-padded with 0.
    pub positions: Array2<u32>,
    /// Zero-filled, `[num_segments, position_width]`.
    pub target_ids: Array2<u32>,
    /// One-filled, `[num_segments, position_width]`.
    pub target_weights: Array2<f32>,
    /// Zero-filled, `[num_segments]`.
    pub pair_labels: Array1<u32>,
}

impl ScoringBatch {
    pub fn assemble(sequences: &[TokenSequence]) -> Result<Self> {
        let first = sequences
            .first()
            .ok_or_else(|| anyhow!("cannot assemble a batch from zero segments"))?;
        let seq_len = first.len();
        if let Some(bad) = sequences.iter().find(|s| s.len() != seq_len) {
            bail!(
                "segments differ in length: {} vs {}",
                bad.len(),
                seq_len
            );
        }

        let rows = sequences.len();
        let shape = (rows, seq_len);
        let input_ids = stack_rows(sequences.iter().map(|s| s.token_ids.as_slice()), shape)?;
        let input_mask = stack_rows(sequences.iter().map(|s| s.input_mask.as_slice()), shape)?;
        let segment_ids = stack_rows(sequences.iter().map(|s| s.segment_ids.as_slice()), shape)?;

        let (position_lists, width) =
            pad_position_lists(sequences.iter().map(|s| s.positions()).collect());
        let positions = Array2::from_shape_vec(
            (rows, width),
            position_lists.into_iter().flatten().collect(),
        )?;

        log::debug!(
            "assembled batch: {} segments x {} tokens, position width {}",
            rows,
            seq_len,
            width
        );

        Ok(Self {
            input_ids,
            input_mask,
            segment_ids,
            positions,
            target_ids: Array2::zeros((rows, width)),
            target_weights: Array2::ones((rows, width)),
            pair_labels: Array1::zeros(rows),
        })
    }

    pub fn num_segments(&self) -> usize {
        self.input_ids.nrows()
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.ncols()
    }

    pub fn position_width(&self) -> usize {
        self.positions.ncols()
    }
}

fn stack_rows<'a>(
    rows: impl Iterator<Item = &'a [u32]>,
    shape: (usize, usize),
) -> Result<Array2<u32>> {
    let flat: Vec<u32> = rows.flat_map(|r| r.iter().copied()).collect();
    Ok(Array2::from_shape_vec(shape, flat)?)
}

/// Right-pad every list with 0 to the widest list's length.
///
/// Position lists are built from already padded sequences, so they all have
/// the same width and this never extends anything in practice.
pub fn pad_position_lists(mut lists: Vec<Vec<u32>>) -> (Vec<Vec<u32>>, usize) {
    let width = lists.iter().map(Vec::len).max().unwrap_or(0);
    for list in &mut lists {
        list.resize(width, 0);
    }
    (lists, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::build_from_ids;
    use crate::special::SpecialTokens;
    use ndarray::array;

    fn special() -> SpecialTokens {
        SpecialTokens::from_vocab_size(100).unwrap()
    }

    #[test]
    fn test_shapes_and_aux_tensors() -> Result<()> {
        let seqs = vec![
            build_from_ids(&[5, 6], &special(), 6),
            build_from_ids(&[7], &special(), 6),
            build_from_ids(&[], &special(), 6),
        ];
        let batch = ScoringBatch::assemble(&seqs)?;

        assert_eq!(batch.num_segments(), 3);
        assert_eq!(batch.seq_len(), 6);
        assert_eq!(batch.position_width(), 6);
        assert_eq!(batch.input_ids.row(1).to_vec(), vec![98, 7, 96, 99, 0, 0]);
        assert_eq!(batch.input_mask.row(2).to_vec(), vec![1, 1, 1, 0, 0, 0]);
        assert!(batch.segment_ids.iter().all(|&v| v == 1));
        assert!(batch.target_ids.iter().all(|&v| v == 0));
        assert!(batch.target_weights.iter().all(|&v| v == 1.0));
        assert_eq!(batch.target_weights.dim(), (3, 6));
        assert_eq!(batch.pair_labels, array![0, 0, 0]);
        for row in batch.positions.rows() {
            assert_eq!(row.to_vec(), vec![0, 1, 2, 3, 4, 5]);
        }
        Ok(())
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(ScoringBatch::assemble(&[]).is_err());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let seqs = vec![
            build_from_ids(&[5], &special(), 6),
            build_from_ids(&[5], &special(), 7),
        ];
        assert!(ScoringBatch::assemble(&seqs).is_err());
    }

    #[test]
    fn test_pad_position_lists() {
        let (lists, width) = pad_position_lists(vec![vec![0, 1, 2], vec![0], vec![]]);
        assert_eq!(width, 3);
        assert_eq!(lists, vec![vec![0, 1, 2], vec![0, 0, 0], vec![0, 0, 0]]);

        let (lists, width) = pad_position_lists(vec![vec![0, 1], vec![0, 1]]);
        assert_eq!(width, 2);
        assert_eq!(lists, vec![vec![0, 1], vec![0, 1]]);
    }
}

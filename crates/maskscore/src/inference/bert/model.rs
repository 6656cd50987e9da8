use std::path::Path;

use anyhow::{Result, anyhow, bail};
use ndarray::{Array1, Array2, ArrayView1, s};

use super::layers::{Activation, LayerNorm, Linear, log_softmax_rows_inplace, softmax_rows_inplace};
use super::weights::{CheckpointWeights, latest_checkpoint};
use crate::batch::ScoringBatch;
use crate::config::{Device, ModelConfig};
use crate::inference::MaskedLmInference;
use crate::sequence::RESERVED_POSITIONS;

/// Additive attention bias for padded key positions.
const MASK_BIAS: f32 = -10000.0;

/// RoBERTa's `padding_idx` when the config does not name one.
const ROBERTA_PAD_TOKEN_ID: usize = 1;

/// Where a checkpoint keeps its encoder and MLM-head tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLayout {
    /// `bert.*` encoder, `cls.predictions.*` head.
    Bert,
    /// `roberta.*` encoder, `lm_head.*` head.
    Roberta,
}

impl WeightLayout {
    pub fn detect(weights: &CheckpointWeights) -> Result<Self> {
        if weights.contains("cls.predictions.bias") {
            Ok(WeightLayout::Bert)
        } else if weights.contains("lm_head.bias") {
            Ok(WeightLayout::Roberta)
        } else {
            Err(anyhow!(
                "checkpoint has no masked-LM head (expected cls.predictions.* or lm_head.*)"
            ))
        }
    }

    fn encoder_prefix(&self, weights: &CheckpointWeights) -> &'static str {
        let prefixed = match self {
            WeightLayout::Bert => "bert.",
            WeightLayout::Roberta => "roberta.",
        };
        if weights.contains(&format!("{}embeddings.word_embeddings.weight", prefixed)) {
            prefixed
        } else {
            ""
        }
    }

    /// First position-embedding row used by token 0. RoBERTa numbers
    /// positions from `padding_idx + 1`.
    pub fn position_offset(&self, config: &ModelConfig) -> usize {
        match self {
            WeightLayout::Bert => 0,
            WeightLayout::Roberta => {
                config.pad_token_id.map_or(ROBERTA_PAD_TOKEN_ID, |id| id as usize) + 1
            }
        }
    }

    fn head_names(&self) -> HeadNames {
        match self {
            WeightLayout::Bert => HeadNames {
                dense: "cls.predictions.transform.dense",
                norm: "cls.predictions.transform.LayerNorm",
                bias: "cls.predictions.bias",
                decoder: "cls.predictions.decoder.weight",
            },
            WeightLayout::Roberta => HeadNames {
                dense: "lm_head.dense",
                norm: "lm_head.layer_norm",
                bias: "lm_head.bias",
                decoder: "lm_head.decoder.weight",
            },
        }
    }
}

struct HeadNames {
    dense: &'static str,
    norm: &'static str,
    bias: &'static str,
    decoder: &'static str,
}

struct EncoderLayer {
    query: Linear,
    key: Linear,
    value: Linear,
    attention_output: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
}

struct MlmHead {
    transform: Linear,
    norm: LayerNorm,
    /// `[vocab, hidden]`, tied to the word embeddings when the checkpoint has
    /// no separate decoder.
    decoder: Array2<f32>,
    bias: Array1<f32>,
}

/// A post-norm BERT encoder with its masked-LM head, on the CPU.
pub struct BertMaskedLm {
    config: ModelConfig,
    layout: WeightLayout,
    position_offset: usize,
    activation: Activation,
    num_heads: usize,
    head_dim: usize,
    word_embeddings: Array2<f32>,
    position_embeddings: Array2<f32>,
    token_type_embeddings: Array2<f32>,
    embeddings_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    head: MlmHead,
}

impl BertMaskedLm {
    /// Restore the latest checkpoint under `model_dir`.
    pub fn load(model_dir: &Path, config: &ModelConfig, device: Device) -> Result<Self> {
        if device != Device::Cpu {
            bail!(
                "device {} requested, but this build only runs inference on the CPU",
                device
            );
        }
        let checkpoint = latest_checkpoint(model_dir)?;
        let weights = CheckpointWeights::load(&checkpoint)?;
        Self::from_weights(config, &weights)
    }

    pub fn from_weights(config: &ModelConfig, weights: &CheckpointWeights) -> Result<Self> {
        let layout = WeightLayout::detect(weights)?;
        let prefix = layout.encoder_prefix(weights);
        let position_offset = layout.position_offset(config);
        if position_offset + RESERVED_POSITIONS > config.max_position_embeddings {
            bail!(
                "max_position_embeddings {} leaves no room for a sequence after position offset {}",
                config.max_position_embeddings,
                position_offset
            );
        }
        log::info!(
            "building {:?} masked LM: {} layers, hidden {}, vocab {}, position offset {}",
            layout,
            config.num_hidden_layers,
            config.hidden_size,
            config.vocab_size,
            position_offset
        );

        let h = config.hidden_size;
        let eps = config.layer_norm_eps;
        let emb = |name: &str, rows: usize| {
            weights.matrix(&format!("{}embeddings.{}.weight", prefix, name), (rows, h))
        };

        let word_embeddings = emb("word_embeddings", config.vocab_size)?;
        let position_embeddings = emb("position_embeddings", config.max_position_embeddings)?;
        let token_type_embeddings = emb("token_type_embeddings", config.type_vocab_size)?;
        let embeddings_norm =
            LayerNorm::load(weights, &format!("{}embeddings.LayerNorm", prefix), h, eps)?;

        let layers = (0..config.num_hidden_layers)
            .map(|i| -> Result<EncoderLayer> {
                let p = format!("{}encoder.layer.{}", prefix, i);
                let inter = config.intermediate_size;
                Ok(EncoderLayer {
                    query: Linear::load(weights, &format!("{}.attention.self.query", p), h, h)?,
                    key: Linear::load(weights, &format!("{}.attention.self.key", p), h, h)?,
                    value: Linear::load(weights, &format!("{}.attention.self.value", p), h, h)?,
                    attention_output: Linear::load(
                        weights,
                        &format!("{}.attention.output.dense", p),
                        h,
                        h,
                    )?,
                    attention_norm: LayerNorm::load(
                        weights,
                        &format!("{}.attention.output.LayerNorm", p),
                        h,
                        eps,
                    )?,
                    intermediate: Linear::load(
                        weights,
                        &format!("{}.intermediate.dense", p),
                        inter,
                        h,
                    )?,
                    output: Linear::load(weights, &format!("{}.output.dense", p), h, inter)?,
                    output_norm: LayerNorm::load(
                        weights,
                        &format!("{}.output.LayerNorm", p),
                        h,
                        eps,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let names = layout.head_names();
        let decoder = if weights.contains(names.decoder) {
            weights.matrix(names.decoder, (config.vocab_size, h))?
        } else {
            log::debug!("no separate decoder weight, tying to word embeddings");
            word_embeddings.clone()
        };
        let head = MlmHead {
            transform: Linear::load(weights, names.dense, h, h)?,
            norm: LayerNorm::load(weights, names.norm, h, eps)?,
            decoder,
            bias: weights.vector(names.bias, config.vocab_size)?,
        };

        Ok(Self {
            activation: config.hidden_act.parse()?,
            num_heads: config.num_attention_heads,
            head_dim: h / config.num_attention_heads,
            config: config.clone(),
            layout,
            position_offset,
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            embeddings_norm,
            layers,
            head,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn layout(&self) -> WeightLayout {
        self.layout
    }

    /// Longest sequence the position embeddings can hold.
    pub fn max_seq_length(&self) -> usize {
        self.config.max_position_embeddings - self.position_offset
    }

    /// Checkpoints with a single token-type row (RoBERTa) embed every
    /// segment id with row 0.
    fn token_type_row(&self, segment_id: u32) -> usize {
        if self.config.type_vocab_size == 1 {
            0
        } else {
            segment_id as usize
        }
    }

    fn check_batch(&self, batch: &ScoringBatch) -> Result<()> {
        let seq_len = batch.seq_len();
        if seq_len > self.max_seq_length() {
            bail!(
                "sequence length {} exceeds the {} positions available (max_position_embeddings {}, offset {})",
                seq_len,
                self.max_seq_length(),
                self.config.max_position_embeddings,
                self.position_offset
            );
        }
        if let Some(&id) = batch.input_ids.iter().find(|&&id| id as usize >= self.config.vocab_size) {
            bail!("token id {} is outside the vocabulary of {}", id, self.config.vocab_size);
        }
        if let Some(&t) = batch
            .segment_ids
            .iter()
            .find(|&&t| self.token_type_row(t) >= self.config.type_vocab_size)
        {
            bail!(
                "segment id {} is outside type_vocab_size {}",
                t,
                self.config.type_vocab_size
            );
        }
        if let Some(&p) = batch.positions.iter().find(|&&p| p as usize >= seq_len) {
            bail!("position index {} is outside sequence length {}", p, seq_len);
        }
        Ok(())
    }

    /// Hidden states `[seq_len, hidden]` for one segment.
    fn encode_segment(
        &self,
        input_ids: ArrayView1<u32>,
        segment_ids: ArrayView1<u32>,
        input_mask: ArrayView1<u32>,
    ) -> Array2<f32> {
        let seq_len = input_ids.len();
        let mut hidden = Array2::<f32>::zeros((seq_len, self.config.hidden_size));
        for (t, mut row) in hidden.rows_mut().into_iter().enumerate() {
            row.assign(&self.word_embeddings.row(input_ids[t] as usize));
            row += &self.position_embeddings.row(t + self.position_offset);
            row += &self.token_type_embeddings.row(self.token_type_row(segment_ids[t]));
        }
        let mut hidden = self.embeddings_norm.forward(&hidden);

        let key_bias: Vec<f32> = input_mask
            .iter()
            .map(|&m| if m == 0 { MASK_BIAS } else { 0.0 })
            .collect();

        for layer in &self.layers {
            hidden = self.layer_forward(layer, &hidden, &key_bias);
        }
        hidden
    }

    fn layer_forward(&self, layer: &EncoderLayer, hidden: &Array2<f32>, key_bias: &[f32]) -> Array2<f32> {
        let q = layer.query.forward(hidden);
        let k = layer.key.forward(hidden);
        let v = layer.value.forward(hidden);
        let scale = 1.0 / (self.head_dim as f32).sqrt();

        let mut context = Array2::<f32>::zeros(hidden.dim());
        for head in 0..self.num_heads {
            let range = head * self.head_dim..(head + 1) * self.head_dim;
            let cols = s![.., range];
            let mut scores = q.slice(cols).dot(&k.slice(cols).t()) * scale;
            for mut row in scores.rows_mut() {
                for (score, bias) in row.iter_mut().zip(key_bias) {
                    *score += bias;
                }
            }
            softmax_rows_inplace(&mut scores);
            context.slice_mut(cols).assign(&scores.dot(&v.slice(cols)));
        }

        let attention = layer.attention_output.forward(&context) + hidden;
        let attention = layer.attention_norm.forward(&attention);

        let mut intermediate = layer.intermediate.forward(&attention);
        self.activation.apply_inplace(&mut intermediate);
        let output = layer.output.forward(&intermediate) + &attention;
        layer.output_norm.forward(&output)
    }

    /// Vocabulary log-probabilities for gathered hidden states.
    fn mlm_head(&self, gathered: &Array2<f32>) -> Array2<f32> {
        let mut x = self.head.transform.forward(gathered);
        self.activation.apply_inplace(&mut x);
        let x = self.head.norm.forward(&x);
        let mut logits = x.dot(&self.head.decoder.t()) + &self.head.bias;
        log_softmax_rows_inplace(&mut logits);
        logits
    }
}

impl MaskedLmInference for BertMaskedLm {
    fn infer(&self, batch: &ScoringBatch) -> Result<Array2<f32>> {
        self.check_batch(batch)?;

        let width = batch.position_width();
        let rows = batch.num_segments() * width;
        let mut gathered = Array2::<f32>::zeros((rows, self.config.hidden_size));

        for b in 0..batch.num_segments() {
            let hidden = self.encode_segment(
                batch.input_ids.row(b),
                batch.segment_ids.row(b),
                batch.input_mask.row(b),
            );
            for (p, &pos) in batch.positions.row(b).iter().enumerate() {
                gathered.row_mut(b * width + p).assign(&hidden.row(pos as usize));
            }
        }

        Ok(self.mlm_head(&gathered))
    }

    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn max_seq_length(&self) -> Option<usize> {
        Some(BertMaskedLm::max_seq_length(self))
    }
}

//! Model configuration record and run options.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::special::SpecialTokens;

/// Config file names looked up in a model directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["hparams.json", "config.json"];

/// Written by TensorFlow BERT training, whose `gelu` is the tanh form.
const TF_HPARAMS_FILE: &str = "hparams.json";

/// The model-configuration record shipped next to the checkpoint.
///
/// Only `vocab_size` and `max_position_embeddings` are required; the
/// remaining fields describe the reference BERT backend and default to
/// BERT-base values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    #[serde(alias = "n_positions")]
    pub max_position_embeddings: usize,

    #[serde(default = "default_hidden_size", alias = "n_embd")]
    pub hidden_size: usize,
    #[serde(default = "default_num_layers", alias = "n_layer")]
    pub num_hidden_layers: usize,
    #[serde(default = "default_num_heads", alias = "n_head")]
    pub num_attention_heads: usize,
    #[serde(default = "default_intermediate_size", alias = "n_inner")]
    pub intermediate_size: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps", alias = "layer_norm_epsilon")]
    pub layer_norm_eps: f32,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
    /// RoBERTa `padding_idx`; position ids start right after it.
    #[serde(default)]
    pub pad_token_id: Option<u32>,
}

fn default_hidden_size() -> usize {
    768
}
fn default_num_layers() -> usize {
    12
}
fn default_num_heads() -> usize {
    12
}
fn default_intermediate_size() -> usize {
    3072
}
fn default_type_vocab_size() -> usize {
    2
}
fn default_layer_norm_eps() -> f32 {
    1e-12
}
fn default_hidden_act() -> String {
    "gelu".to_string()
}

impl ModelConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("malformed model configuration record")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model config {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("in {:?}", path))
    }

    /// Locate and parse the configuration record inside `model_dir`.
    pub fn from_model_dir(model_dir: &Path) -> Result<Self> {
        let path = Self::locate(model_dir)?;
        log::info!("loading model config from {:?}", path);
        let mut config = Self::from_file(&path)?;
        if path.file_name().is_some_and(|n| n == TF_HPARAMS_FILE) && config.hidden_act == "gelu" {
            log::debug!("{} uses the tanh gelu approximation", TF_HPARAMS_FILE);
            config.hidden_act = "gelu_new".to_string();
        }
        Ok(config)
    }

    pub fn locate(model_dir: &Path) -> Result<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| model_dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                anyhow!(
                    "no model config found in {:?} (looked for {})",
                    model_dir,
                    CONFIG_FILE_NAMES.join(", ")
                )
            })
    }

    fn validate(&self) -> Result<()> {
        if self.max_position_embeddings < 3 {
            bail!(
                "max_position_embeddings must be at least 3 to fit the sentinels, got {}",
                self.max_position_embeddings
            );
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            bail!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size,
                self.num_attention_heads
            );
        }
        if self.type_vocab_size == 0 {
            bail!("type_vocab_size must be at least 1");
        }
        SpecialTokens::from_vocab_size(self.vocab_size)?;
        Ok(())
    }

    /// Every sequence is padded to exactly this many positions.
    pub fn max_seq_length(&self) -> usize {
        self.max_position_embeddings
    }

    pub fn special_tokens(&self) -> Result<SpecialTokens> {
        SpecialTokens::from_vocab_size(self.vocab_size)
    }
}

/// How per-token scores are reduced and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Sum per segment, then per context; return the context sums.
    ValueOnly,
    /// Rows of `score, actual token, predicted token`.
    MaxAnnotated,
    /// Rows of `score, actual token`.
    #[default]
    PlainAnnotated,
}

impl OutputMode {
    /// Resolve the two command-line switches. `value_only` is checked first.
    pub fn from_flags(output_max: bool, value_only: bool) -> Self {
        if value_only {
            OutputMode::ValueOnly
        } else if output_max {
            OutputMode::MaxAnnotated
        } else {
            OutputMode::PlainAnnotated
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::ValueOnly => write!(f, "value-only"),
            OutputMode::MaxAnnotated => write!(f, "output-max"),
            OutputMode::PlainAnnotated => write!(f, "plain"),
        }
    }
}

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Gpu(usize),
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" => Ok(Device::Gpu(0)),
            _ => {
                let ordinal = s
                    .strip_prefix("gpu:")
                    .or_else(|| s.strip_prefix("cuda:"))
                    .unwrap_or(&s);
                ordinal
                    .parse::<usize>()
                    .map(Device::Gpu)
                    .map_err(|_| anyhow!("invalid device '{}': use cpu, gpu or gpu:<N>", s))
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu(n) => write!(f, "gpu:{}", n),
        }
    }
}

/// Options for one multi-context scoring run.
#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Segment delimiter; empty means each context is one segment.
    pub split_tag: String,
    pub output_mode: OutputMode,
    pub device: Device,
}

impl ScoreOptions {
    pub fn with_split_tag(mut self, tag: impl Into<String>) -> Self {
        self.split_tag = tag.into();
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() -> Result<()> {
        let config =
            ModelConfig::from_json(r#"{"vocab_size": 100, "max_position_embeddings": 10}"#)?;
        assert_eq!(config.max_seq_length(), 10);
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.type_vocab_size, 2);
        assert_eq!(config.hidden_act, "gelu");
        assert_eq!(config.special_tokens()?.cls, 98);
        Ok(())
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let err = ModelConfig::from_json(r#"{"vocab_size": 100}"#).unwrap_err();
        assert!(format!("{:#}", err).contains("max_position_embeddings"));
    }

    #[test]
    fn test_gpt_style_aliases() -> Result<()> {
        let config = ModelConfig::from_json(
            r#"{"vocab_size": 64, "n_positions": 16, "n_embd": 8, "n_layer": 1, "n_head": 2}"#,
        )?;
        assert_eq!(config.max_position_embeddings, 16);
        assert_eq!(config.hidden_size, 8);
        assert_eq!(config.num_hidden_layers, 1);
        Ok(())
    }

    #[test]
    fn test_indivisible_heads_rejected() {
        let json = r#"{"vocab_size": 64, "max_position_embeddings": 16,
                       "hidden_size": 10, "num_attention_heads": 3}"#;
        assert!(ModelConfig::from_json(json).is_err());
    }

    #[test]
    fn test_locate_prefers_hparams() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("config.json"), "{}")?;
        std::fs::write(
            dir.path().join("hparams.json"),
            r#"{"vocab_size": 100, "max_position_embeddings": 10}"#,
        )?;
        assert_eq!(
            ModelConfig::locate(dir.path())?,
            dir.path().join("hparams.json")
        );
        assert_eq!(ModelConfig::from_model_dir(dir.path())?.vocab_size, 100);
        Ok(())
    }

    #[test]
    fn test_hparams_gelu_is_tanh_form() -> Result<()> {
        let json = r#"{"vocab_size": 100, "max_position_embeddings": 10}"#;

        let tf_dir = tempfile::tempdir()?;
        std::fs::write(tf_dir.path().join("hparams.json"), json)?;
        assert_eq!(ModelConfig::from_model_dir(tf_dir.path())?.hidden_act, "gelu_new");

        let hf_dir = tempfile::tempdir()?;
        std::fs::write(hf_dir.path().join("config.json"), json)?;
        assert_eq!(ModelConfig::from_model_dir(hf_dir.path())?.hidden_act, "gelu");

        std::fs::write(
            tf_dir.path().join("hparams.json"),
            r#"{"vocab_size": 100, "max_position_embeddings": 10, "hidden_act": "relu"}"#,
        )?;
        assert_eq!(ModelConfig::from_model_dir(tf_dir.path())?.hidden_act, "relu");
        Ok(())
    }

    #[test]
    fn test_roberta_fields() -> Result<()> {
        let config = ModelConfig::from_json(
            r#"{"vocab_size": 100, "max_position_embeddings": 10,
                "type_vocab_size": 1, "pad_token_id": 1}"#,
        )?;
        assert_eq!(config.type_vocab_size, 1);
        assert_eq!(config.pad_token_id, Some(1));

        let zero_types = r#"{"vocab_size": 100, "max_position_embeddings": 10, "type_vocab_size": 0}"#;
        assert!(ModelConfig::from_json(zero_types).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelConfig::from_model_dir(dir.path()).is_err());
    }

    #[test]
    fn test_output_mode_precedence() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::ValueOnly);
        assert_eq!(OutputMode::from_flags(false, true), OutputMode::ValueOnly);
        assert_eq!(OutputMode::from_flags(true, false), OutputMode::MaxAnnotated);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::PlainAnnotated);
    }

    #[test]
    fn test_device_parsing() -> Result<()> {
        assert_eq!("cpu".parse::<Device>()?, Device::Cpu);
        assert_eq!("GPU".parse::<Device>()?, Device::Gpu(0));
        assert_eq!("gpu:2".parse::<Device>()?, Device::Gpu(2));
        assert_eq!("1".parse::<Device>()?, Device::Gpu(1));
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!(Device::Gpu(3).to_string(), "gpu:3");
        Ok(())
    }
}

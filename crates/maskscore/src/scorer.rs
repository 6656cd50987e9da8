//! Multi-context scoring runs.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{ModelConfig, OutputMode, ScoreOptions};
use crate::engine::ScoreEngine;
use crate::inference::BertMaskedLm;
use crate::output::{ContextScore, GrandTotal, OutputFormatter, format_score};
use crate::tokenizer::{TokenizerFiles, load_tokenizer};

/// Holds the model and tokenizer for the lifetime of one run.
///
/// Both are released when the scorer is dropped, whether the run finished
/// or bailed out early.
pub struct Scorer {
    engine: ScoreEngine,
    options: ScoreOptions,
}

impl Scorer {
    pub fn new(engine: ScoreEngine, options: ScoreOptions) -> Self {
        Self { engine, options }
    }

    /// Load config, tokenizer and the CPU reference model from a model
    /// directory.
    pub fn from_model_dir(
        model_dir: &Path,
        options: ScoreOptions,
        files: &TokenizerFiles,
    ) -> Result<Self> {
        let config = ModelConfig::from_model_dir(model_dir)?;
        let tokenizer = load_tokenizer(model_dir, files)?;
        log::info!("using {} tokenizer", tokenizer.kind());

        let model = BertMaskedLm::load(model_dir, &config, options.device)
            .with_context(|| format!("failed to load model from {:?}", model_dir))?;
        let engine = ScoreEngine::new(Box::new(model), tokenizer, &config)?;

        log::info!(
            "scorer ready: max_seq_length {}, {}, mode {}",
            engine.max_seq_length(),
            engine.special_tokens(),
            options.output_mode
        );
        Ok(Self::new(engine, options))
    }

    pub fn engine(&self) -> &ScoreEngine {
        &self.engine
    }

    pub fn options(&self) -> &ScoreOptions {
        &self.options
    }

    /// Score every context in order and write the results to `out`.
    ///
    /// In value-only mode each context sum is returned and the running grand
    /// total is written after every context. The annotated modes write one
    /// text block per context and return an empty list.
    pub fn score_all<S: AsRef<str>>(&self, contexts: &[S], out: &mut dyn Write) -> Result<Vec<f32>> {
        let formatter = OutputFormatter::new(
            self.options.output_mode,
            self.engine.tokenizer(),
            *self.engine.special_tokens(),
        );
        let mut values = Vec::new();
        let mut total = GrandTotal::default();

        for (i, context) in contexts.iter().enumerate() {
            let records = self
                .engine
                .score_context(context.as_ref(), &self.options.split_tag)
                .with_context(|| format!("failed to score context {}", i))?;

            match formatter.reduce(&records)? {
                ContextScore::Value(value) => {
                    values.push(value);
                    writeln!(out, "{}", format_score(total.add(value)))?;
                }
                ContextScore::Text(text) => writeln!(out, "{}", text)?,
            }
        }
        out.flush()?;

        if self.options.output_mode == OutputMode::ValueOnly {
            log::info!(
                "scored {} contexts, grand total {}",
                contexts.len(),
                format_score(total.value())
            );
        } else {
            log::info!("scored {} contexts", contexts.len());
        }
        Ok(values)
    }
}

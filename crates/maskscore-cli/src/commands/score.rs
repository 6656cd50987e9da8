use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use maskscore::{Device, OutputMode, ScoreOptions, Scorer, TokenizerFiles};

use super::util::resolve_contexts;

#[allow(clippy::too_many_arguments)]
pub fn run(
    model: &Path,
    contexts: &[String],
    input: Option<&Path>,
    split_tag: &str,
    device: &str,
    output_max: bool,
    value_only: bool,
    vocab: Option<PathBuf>,
    symbols: Option<PathBuf>,
) -> Result<()> {
    // 1. Resolve inputs and options
    let contexts = resolve_contexts(contexts, input)?;
    let device: Device = device.parse()?;
    let options = ScoreOptions::default()
        .with_split_tag(split_tag)
        .with_output_mode(OutputMode::from_flags(output_max, value_only))
        .with_device(device);
    let files = TokenizerFiles { vocab, symbols };

    // 2. Load model and tokenizer once for the whole run
    let scorer = Scorer::from_model_dir(model, options, &files)?;

    // 3. Score
    log::info!("scoring {} contexts", contexts.len());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    scorer.score_all(&contexts, &mut out)?;

    Ok(())
}

use std::path::Path;

use anyhow::Result;
use maskscore::inference::bert::latest_checkpoint;
use maskscore::{ModelConfig, TokenizerFiles, load_tokenizer};

pub fn run(model: &Path) -> Result<()> {
    let config_path = ModelConfig::locate(model)?;
    let config = ModelConfig::from_file(&config_path)?;
    let special = config.special_tokens()?;
    let checkpoint = latest_checkpoint(model)?;
    let tokenizer = load_tokenizer(model, &TokenizerFiles::default())?;

    println!("Model directory:  {}", model.display());
    println!("Config:           {}", config_path.display());
    println!("Checkpoint:       {}", checkpoint.display());
    println!("Tokenizer:        {}", tokenizer.kind());
    println!("Vocab size:       {}", config.vocab_size);
    println!("Max seq length:   {}", config.max_seq_length());
    println!(
        "Encoder:          {} layers, hidden {}, {} heads, {}",
        config.num_hidden_layers, config.hidden_size, config.num_attention_heads, config.hidden_act
    );
    println!("Sentinels:        {}", special);

    Ok(())
}

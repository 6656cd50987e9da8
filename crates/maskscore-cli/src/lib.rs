use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "maskscore")]
#[command(about = "Score text spans with a masked language model", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Score one or more contexts
    Score {
        /// Model directory (config, checkpoint, tokenizer files)
        #[arg(short, long)]
        model: PathBuf,

        /// Context to score; repeat for several. Falls back to --input, then stdin
        #[arg(short, long)]
        context: Vec<String>,

        /// File with one context per line
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Delimiter splitting a context into segments (empty = no split)
        #[arg(long, default_value = "")]
        split_tag: String,

        /// Inference device: cpu, gpu or gpu:<N>
        #[arg(long, default_value = "cpu")]
        device: String,

        /// Print score, actual token and predicted token per position
        #[arg(long)]
        output_max: bool,

        /// Print only summed scores (overrides --output-max)
        #[arg(long)]
        value_only: bool,

        /// Vocabulary file (requires --symbols)
        #[arg(long, requires = "symbols")]
        vocab: Option<PathBuf>,

        /// Symbol table file (requires --vocab)
        #[arg(long, requires = "vocab")]
        symbols: Option<PathBuf>,
    },

    /// Show what a model directory resolves to
    Info {
        /// Model directory
        #[arg(short, long)]
        model: PathBuf,
    },
}

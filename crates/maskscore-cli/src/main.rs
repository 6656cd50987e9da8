mod commands;

use anyhow::Result;
use clap::Parser;

use maskscore_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    unsafe {
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    match cli.command {
        Commands::Score {
            model,
            context,
            input,
            split_tag,
            device,
            output_max,
            value_only,
            vocab,
            symbols,
        } => commands::score::run(
            &model,
            &context,
            input.as_deref(),
            &split_tag,
            &device,
            output_max,
            value_only,
            vocab,
            symbols,
        ),

        Commands::Info { model } => commands::info::run(&model),
    }
}

pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use mempack_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            pattern,
            pack,
            ann,
            config,
        } => handlers::handle_build(input, pattern, pack, ann, config),
        Commands::Search {
            pack,
            ann,
            query,
            top_k,
            filter,
            config,
        } => handlers::handle_search(pack, ann, query, top_k, filter, config),
        Commands::Verify { pack } => handlers::handle_verify(pack),
        Commands::Stats { pack, ann, config } => handlers::handle_stats(pack, ann, config),
    }
}

use std::process;

use amr_explorer::cli::{self, Cli};
use clap::Parser;
use env_logger::Env;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = cli::execute(&cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

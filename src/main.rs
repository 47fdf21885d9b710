use clap::Parser;
use tradecore::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

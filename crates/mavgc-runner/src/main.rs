use std::process::ExitCode;

use clap::Parser;
use mavgc_runner::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match mavgc_runner::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mavgc: {}", e);
            ExitCode::FAILURE
        }
    }
}

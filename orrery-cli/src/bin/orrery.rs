use clap::Parser;
use orrery_cli::cli::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    orrery_cli::run(Cli::parse()).await
}

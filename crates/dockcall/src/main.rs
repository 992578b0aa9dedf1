use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Invocation failures carry their own exit codes
            if let Some(code) = cli::exit_code_for(&err) {
                eprintln!("Error: {}", err);
                std::process::exit(code);
            }
            Err(err)
        }
    }
}

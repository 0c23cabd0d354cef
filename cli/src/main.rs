use clap::Parser;
use tracing::info;

mod cli;
mod client;
mod error;
mod logging;
mod output;
mod poll;

use cli::Cli;
use logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }

    match cli.run().await {
        Ok(_) => {
            info!("ambient-session completed");
        }
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

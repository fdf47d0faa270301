// CyberSensei node agent entry point

use clap::Parser;
use cybersensei_node::{commands, logging, output, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    if let Err(e) = commands::execute(cli).await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

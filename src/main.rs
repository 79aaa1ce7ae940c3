mod cli;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = drivefetch::logging::init_logging(cli.verbose) {
        eprintln!("drivefetch: {err:#}");
    }

    match cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("drivefetch error: {err:#}");
            std::process::exit(1);
        }
    }
}

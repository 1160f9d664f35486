use clap::Parser;
use delve_cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

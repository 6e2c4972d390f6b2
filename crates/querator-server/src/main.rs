use clap::Parser;
use querator_server::cli::{run_cli, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli).await {
        // Logging may not be initialised when configuration fails.
        eprintln!("querator: {}", e);
        std::process::exit(e.exit_code());
    }
}

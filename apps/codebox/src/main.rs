use clap::Parser;
use codebox_client_core::terminal::{app, cli::Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    match app::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = relaytvd::Cli::parse();
    relaytvd::init_tracing(cli.verbose);
    if let Err(err) = relaytvd::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

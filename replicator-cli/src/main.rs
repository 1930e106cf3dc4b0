use clap::Parser;
use replicator_cli::cli::{Cli, Commands};
use replicator_cli::{app, logging, set_panic_hook};
use std::process;

fn main() {
    set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.log_format);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let result = runtime.block_on(async move {
        match cli.cmd {
            Commands::Run(args) => app::run(args).await,
            Commands::Stop(args) => app::stop(args).await,
        }
    });

    if let Err(e) = result {
        tracing::error!("{e}");
        process::exit(1);
    }
}

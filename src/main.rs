use clap::Parser;
use db_utils::cli::{init_logging, run, Cli};
use db_utils::SchemaError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut stdout = std::io::stdout().lock();
    match run(cli, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {:#}", e);
            let code = e.downcast_ref::<SchemaError>().map_or(1, SchemaError::exit_code);
            ExitCode::from(code)
        }
    }
}

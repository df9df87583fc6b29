//! auth-session binary entry point.

use std::process::ExitCode;

use auth_session::cli::{self, Args};
use auth_session::commands;
use auth_session::config::Config;
use auth_session::logging;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'auth-session --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(&args)?;
    logging::init_with_filter(config.log_filter()).ok();

    let Some(command) = args.command else {
        cli::print_help();
        return Ok(());
    };

    debug!(
        backend = %config.storage.backend,
        prefix = config.prefix(),
        "storage configured"
    );
    let storage = config.open_storage()?;

    let mut stdout = std::io::stdout().lock();
    commands::execute(&command, storage, config.prefix(), &mut stdout).await?;
    Ok(())
}

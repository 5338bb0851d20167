mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use thola_core::RequestKind;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // Checks exit with their plugin status; errors with the mapped code.
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(code);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let global = cli.global;
    let (host, kind) = match cli.command {
        // Config commands don't touch a device
        Command::Config(command) => {
            commands::config_cmd::handle(&command, global.config.as_deref())?;
            return Ok(0);
        }

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "thola", &mut std::io::stdout());
            return Ok(0);
        }

        Command::Identify(args) => (args.host, RequestKind::Identify),
        Command::Read(read) => commands::read::request(read),
        Command::Check(check) => commands::check::request(check),
    };

    let config = thola_config::load_config(global.config.as_deref())?;
    commands::execute(&host, kind, &global, &config).await
}

use ankiq::cli::{run, Cli};
use ankiq::Collection;
use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::io::stdout;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.verbose);

    let collection = Collection::new(cli.config()?);
    run(&collection, cli.command, cli.format, stdout().lock())
}

/// Parses like clap would, but any usage error exits with status 1 after
/// listing the available commands.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                let _ = err.print();
                process::exit(1)
            }
            _ => {
                let _ = err.print();
                eprintln!();
                let _ = Cli::command().write_help(&mut std::io::stderr());
                process::exit(1)
            }
        },
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(level))
        .compact()
        .init();
}

mod cmd;
mod exit;
mod logging;
mod output;

use clap::{CommandFactory, FromArgMatches, Parser};
use jointlink_codec::MsgType;

use crate::cmd::{Command, LinkArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::{payload_template, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "jointlink",
    version,
    about = "Talk to a joint controller over its serial link"
)]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Debug logging and hex dumps of every frame.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Clap command with the zeroed payload template in each setter's help.
fn cli_command() -> clap::Command {
    let mut command = Cli::command();
    for ty in MsgType::ALL.into_iter().filter(|ty| ty.is_setter()) {
        if let Some(template) = payload_template(ty) {
            command = command.mut_subcommand(ty.name(), |sub| {
                sub.after_help(format!("CONFIG template:\n{template}"))
            });
        }
    }
    command
}

fn main() {
    let matches = cli_command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    init_logging(cli.log_format, cli.log_level.with_verbose(cli.verbose));

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.link, format, cli.verbose);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

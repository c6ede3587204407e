use std::time::Duration;

use clap::{Args, Subcommand};
use jointlink_codec::MsgType;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod message;
pub mod version;

/// One subcommand per message type, plus `version`.
#[derive(Subcommand, Debug)]
#[command(rename_all = "snake_case")]
pub enum Command {
    /// Send a no-op packet.
    Nop,
    /// Set target position and speed of every joint.
    SetJointsPositionSpeed(PayloadArgs),
    /// Read position and speed of every joint.
    GetJointsPositionSpeed,
    /// Read controller uptime and transmission error count.
    GetStatus,
    /// Read controller firmware version.
    GetVersion,
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// Message type sent by this command, with its JSON payload if any.
    pub fn request(&self) -> Option<(MsgType, Option<&str>)> {
        match self {
            Command::Nop => Some((MsgType::Nop, None)),
            Command::SetJointsPositionSpeed(args) => {
                Some((MsgType::SetJointsPositionSpeed, Some(args.config.as_str())))
            }
            Command::GetJointsPositionSpeed => Some((MsgType::GetJointsPositionSpeed, None)),
            Command::GetStatus => Some((MsgType::GetStatus, None)),
            Command::GetVersion => Some((MsgType::GetVersion, None)),
            Command::Version(_) => None,
        }
    }
}

pub fn run(
    command: Command,
    link: &LinkArgs,
    format: OutputFormat,
    verbose: bool,
) -> CliResult<i32> {
    if let Command::Version(args) = command {
        return version::run(args);
    }
    match command.request() {
        Some((ty, config)) => message::run(ty, config, link, format, verbose),
        None => Err(CliError::new(
            crate::exit::INTERNAL,
            format!("unhandled command {command:?}"),
        )),
    }
}

/// Serial link settings shared by every message command.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Serial device of the controller.
    #[arg(
        long,
        short = 'p',
        env = "JOINTLINK_PORT",
        default_value = "/dev/ttyACM0",
        global = true
    )]
    pub port: String,

    /// Baud rate.
    #[arg(long, short = 'b', default_value_t = 115_200, global = true)]
    pub baud: u32,

    /// Read timeout multiplier: about 1.1 for native USB CDC, 10 for UART
    /// bridges such as FTDI.
    #[arg(long, short = 't', default_value_t = 10.0, global = true)]
    pub timeout_factor: f64,

    /// Pause after opening the port before sending (e.g. 1s, 200ms, 0s).
    #[arg(long, default_value = "1s", global = true)]
    pub settle: String,

    /// Maximum time to wait for a reply or for the send to complete.
    #[arg(long, default_value = "5s", global = true)]
    pub wait_timeout: String,

    /// Keep printing received messages until Ctrl-C.
    #[arg(long, short = 'l', global = true)]
    pub listen: bool,
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Payload fields as JSON.
    #[arg(value_name = "CONFIG")]
    pub config: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms` or bare seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let duration = parse_delay(input)?;
    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}

/// Like [`parse_duration`] but accepts zero.
pub fn parse_delay(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

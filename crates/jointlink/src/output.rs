use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use jointlink_codec::{Message, MsgType};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::Sent => "->",
            Direction::Received => "<-",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

#[derive(Serialize)]
struct MessageOutput {
    direction: Direction,
    msg_type: u16,
    type_name: String,
    data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<String>,
    timestamp: String,
}

impl MessageOutput {
    fn new(msg: &Message, direction: Direction, verbose: bool) -> Self {
        Self {
            direction,
            msg_type: msg.msg_type_id(),
            type_name: msg.type_name(),
            data: msg.to_structured(),
            frame: verbose.then(|| hex_dump(&msg.encode())),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_message(msg: &Message, direction: Direction, format: OutputFormat, verbose: bool) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput::new(msg, direction, verbose);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut header = vec!["DIRECTION", "TYPE", "ID", "FIELD", "VALUE"];
            let mut row = vec![
                direction.label().to_string(),
                msg.type_name(),
                msg.msg_type_id().to_string(),
                msg.payload_field().to_string(),
                payload_value(msg).to_string(),
            ];
            if verbose {
                header.push("FRAME");
                row.push(hex_dump(&msg.encode()));
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} {msg}", direction.arrow());
            if verbose {
                println!("   frame: {}", hex_dump(&msg.encode()));
            }
        }
        OutputFormat::Raw => {
            println!("{}", hex_dump(&msg.encode()));
        }
    }
}

/// Space-separated lowercase hex bytes.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Zeroed payload of `ty` as pretty JSON, for help text.
pub fn payload_template(ty: MsgType) -> Option<String> {
    Message::new(ty)
        .payload_structured()
        .and_then(|payload| serde_json::to_string_pretty(&payload).ok())
}

fn payload_value(msg: &Message) -> Value {
    msg.to_structured()
        .get(msg.payload_field())
        .cloned()
        .unwrap_or(Value::Null)
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

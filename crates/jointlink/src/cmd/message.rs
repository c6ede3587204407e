use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jointlink_codec::{Message, MsgType};
use jointlink_link::{ConnectOptions, LinkConfig, LinkManager, LinkStats};
use jointlink_transport::{PortOpener, SerialPortOpener};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::cmd::{parse_delay, parse_duration, LinkArgs};
use crate::exit::{
    codec_error, link_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, TRANSPORT_ERROR,
    USAGE,
};
use crate::output::{print_message, Direction, OutputFormat};

pub fn run(
    ty: MsgType,
    config: Option<&str>,
    args: &LinkArgs,
    format: OutputFormat,
    verbose: bool,
) -> CliResult<i32> {
    run_with(SerialPortOpener, ty, config, args, format, verbose)
}

fn run_with(
    opener: impl PortOpener + 'static,
    ty: MsgType,
    config: Option<&str>,
    args: &LinkArgs,
    format: OutputFormat,
    verbose: bool,
) -> CliResult<i32> {
    // Bad input fails before the port is touched.
    let msg = build_message(ty, config)?;
    let settle = parse_delay(&args.settle)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let link = LinkManager::with_config(
        opener,
        LinkConfig {
            timeout_margin: args.timeout_factor,
            ..LinkConfig::default()
        },
    );
    link.connect(&args.port, args.baud, ConnectOptions::default())
        .map_err(|err| link_error("connect failed", err))?;
    link.start().map_err(|err| link_error("start failed", err))?;
    thread::sleep(settle);

    let result = if ty.is_getter() {
        request(&link, msg, wait_timeout, format, verbose)
    } else {
        send(&link, msg, wait_timeout, format, verbose)
    };
    let result = match result {
        Ok(_) if args.listen => listen(&link, format, verbose),
        other => other,
    };

    link.stop();
    let joined = link
        .join()
        .map_err(|err| link_error("service loop failed", err));
    debug!(stats = ?link.stats(), "link closed");

    let code = result?;
    joined?;
    Ok(code)
}

/// Message of type `ty`, with `config` as the payload of setters.
fn build_message(ty: MsgType, config: Option<&str>) -> CliResult<Message> {
    let Some(config) = config else {
        return Ok(Message::new(ty));
    };

    let payload: Value = serde_json::from_str(config)
        .map_err(|err| CliError::new(USAGE, format!("CONFIG is not valid JSON: {err}")))?;
    let field = ty
        .payload_field()
        .ok_or_else(|| CliError::new(USAGE, format!("{ty} takes no payload")))?;

    let mut fields = Map::new();
    fields.insert(field.to_string(), payload);
    Message::from_structured(ty, Value::Object(fields))
        .map_err(|err| codec_error("invalid CONFIG", err))
}

/// Send a request and print the first reply.
fn request(
    link: &LinkManager,
    msg: Message,
    wait_timeout: Duration,
    format: OutputFormat,
    verbose: bool,
) -> CliResult<i32> {
    if verbose {
        print_message(&msg, Direction::Sent, format, verbose);
    }
    link.put_message(msg);

    match link.wait_for_message_timeout(wait_timeout) {
        Some(reply) => {
            print_message(&reply, Direction::Received, format, verbose);
            Ok(SUCCESS)
        }
        None if !link.is_connected() => Err(CliError::new(
            TRANSPORT_ERROR,
            "serial link lost before a reply arrived",
        )),
        None => Err(CliError::new(
            TIMEOUT,
            format!("no reply to {} within {wait_timeout:?}", msg.type_name()),
        )),
    }
}

/// Send a message and wait until the service loop has written it.
fn send(
    link: &LinkManager,
    msg: Message,
    wait_timeout: Duration,
    format: OutputFormat,
    verbose: bool,
) -> CliResult<i32> {
    let before = link.stats();
    print_message(&msg, Direction::Sent, format, verbose);
    link.put_message(msg);

    let settled = wait_until(link, wait_timeout, || {
        link.pending_transmit() == 0 && tx_outcomes(&link.stats()) > tx_outcomes(&before)
    });

    if link.stats().frames_sent > before.frames_sent {
        Ok(SUCCESS)
    } else if settled {
        Err(CliError::new(
            TRANSPORT_ERROR,
            format!("{} was not delivered: serial link lost", msg.type_name()),
        ))
    } else {
        Err(CliError::new(
            TIMEOUT,
            format!("{} not sent within {wait_timeout:?}", msg.type_name()),
        ))
    }
}

/// Transmit attempts that reached a final outcome.
fn tx_outcomes(stats: &LinkStats) -> u64 {
    stats.frames_sent + stats.io_failures + stats.dropped_while_disconnected
}

fn wait_until(link: &LinkManager, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(link.config().wait_interval);
    }
}

fn listen(link: &LinkManager, format: OutputFormat, verbose: bool) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!("listening for messages, Ctrl-C to stop");

    while running.load(Ordering::SeqCst) {
        match link.get_message() {
            Some(msg) => print_message(&msg, Direction::Received, format, verbose),
            None if !link.is_connected() => {
                return Err(CliError::new(TRANSPORT_ERROR, "serial link lost"));
            }
            None => thread::sleep(link.config().wait_interval),
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use jointlink_codec::{JointMoveSpeed, Status};
    use jointlink_transport::{LoopbackHandle, LoopbackOpener};

    use super::*;
    use crate::exit::DATA_INVALID;

    fn link_args() -> LinkArgs {
        LinkArgs {
            port: "/dev/ttyLOOP0".to_string(),
            baud: 115_200,
            timeout_factor: 10.0,
            settle: "0s".to_string(),
            wait_timeout: "2s".to_string(),
            listen: false,
        }
    }

    fn reply_after_first_write(handle: LoopbackHandle, reply: Message) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(2);
            while handle.written().is_empty() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            handle.feed(&reply.encode());
        })
    }

    #[test]
    fn build_message_wraps_config_in_payload_field() {
        let msg = build_message(
            MsgType::SetJointsPositionSpeed,
            Some(r#"{"joints": [{"position": 50, "speed": 100}, {"position": 0, "speed": 0}, {"position": -5, "speed": 1}]}"#),
        )
        .expect("config should build a message");

        match msg {
            Message::SetJointsPositionSpeed(joints) => {
                assert_eq!(
                    joints.joints[0],
                    JointMoveSpeed {
                        position: 50,
                        speed: 100
                    }
                );
                assert_eq!(joints.joints[2].position, -5);
            }
            other => panic!("unexpected message {other}"),
        }
    }

    #[test]
    fn build_message_rejects_bad_json_as_usage() {
        let err = build_message(MsgType::SetJointsPositionSpeed, Some("{not json"))
            .expect_err("bad JSON should fail");
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn build_message_rejects_out_of_range_value() {
        let err = build_message(
            MsgType::SetJointsPositionSpeed,
            Some(r#"{"joints": [{"position": 40000, "speed": 0}, {"position": 0, "speed": 0}, {"position": 0, "speed": 0}]}"#),
        )
        .expect_err("out-of-range value should fail");
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn getter_prints_reply() {
        let opener = LoopbackOpener::new();
        let device = reply_after_first_write(
            opener.handle(),
            Message::GetStatus(Status {
                uptime: 12345,
                transmission_errors: 2,
            }),
        );

        let code = run_with(
            opener,
            MsgType::GetStatus,
            None,
            &link_args(),
            OutputFormat::Json,
            false,
        )
        .expect("getter should succeed");
        assert_eq!(code, SUCCESS);
        device.join().expect("device thread should finish");
    }

    #[test]
    fn getter_times_out_without_reply() {
        let args = LinkArgs {
            wait_timeout: "30ms".to_string(),
            ..link_args()
        };
        let err = run_with(
            LoopbackOpener::new(),
            MsgType::GetVersion,
            None,
            &args,
            OutputFormat::Json,
            false,
        )
        .expect_err("silent device should time out");
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn setter_writes_one_frame_and_closes_port() {
        let opener = LoopbackOpener::new();
        let handle = opener.handle();
        let code = run_with(
            opener,
            MsgType::SetJointsPositionSpeed,
            Some(r#"{"joints": [{"position": 50, "speed": 100}, {"position": 0, "speed": 0}, {"position": 0, "speed": 0}]}"#),
            &link_args(),
            OutputFormat::Raw,
            false,
        )
        .expect("setter should succeed");

        assert_eq!(code, SUCCESS);
        let written = handle.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0][..6], [0x01, 0x00, 0x32, 0x00, 0x64, 0x00]);
        assert!(!handle.is_open());
    }

    #[test]
    fn failed_write_is_reported() {
        let opener = LoopbackOpener::new();
        opener.handle().fail_next_write();
        let err = run_with(
            opener,
            MsgType::Nop,
            None,
            &link_args(),
            OutputFormat::Pretty,
            false,
        )
        .expect_err("failed write should be reported");
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn open_failure_is_transport_error() {
        let opener = LoopbackOpener::new();
        opener.handle().set_fail_open(true);
        let err = run_with(
            opener,
            MsgType::GetStatus,
            None,
            &link_args(),
            OutputFormat::Json,
            false,
        )
        .expect_err("refused open should fail");
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.contains("/dev/ttyLOOP0"));
    }
}

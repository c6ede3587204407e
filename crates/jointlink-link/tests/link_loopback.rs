use std::thread;
use std::time::{Duration, Instant};

use jointlink_codec::{Message, MsgType, Status, PACKET_SIZE};
use jointlink_link::{ConnectOptions, LinkConfig, LinkError, LinkManager};
use jointlink_transport::{LoopbackHandle, LoopbackOpener, TransportError};
use serde_json::json;

const DEVICE: &str = "/dev/ttyLOOP0";

fn running_link() -> (LinkManager, LoopbackHandle) {
    let opener = LoopbackOpener::new();
    let handle = opener.handle();
    let link = LinkManager::new(opener);
    link.connect(DEVICE, 115_200, ConnectOptions::default())
        .expect("loopback connect should succeed");
    link.start().expect("service loop should start");
    (link, handle)
}

fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn get_version_request_goes_out_as_one_frame() {
    let (link, handle) = running_link();
    link.put_message(Message::new(MsgType::GetVersion));

    eventually("frame written", || !handle.written().is_empty());
    let written = handle.take_written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].len(), PACKET_SIZE);
    assert_eq!(written[0][..2], [4, 0]);
    assert!(written[0][2..].iter().all(|b| *b == 0));

    link.stop();
    link.join().expect("service loop should join");
}

#[test]
fn status_reply_is_decoded_and_queued() {
    let (link, handle) = running_link();
    let reply = Message::GetStatus(Status {
        uptime: 12345,
        transmission_errors: 2,
    });
    handle.feed(&reply.encode());

    let received = link
        .wait_for_message_timeout(Duration::from_secs(2))
        .expect("reply");
    assert_eq!(
        received.to_structured(),
        json!({"status": {"uptime": 12345, "transmission_errors": 2}})
    );
    assert_eq!(link.stats().frames_received, 1);

    link.stop();
    link.join().expect("service loop should join");
}

#[test]
fn replies_arrive_in_order() {
    let (link, handle) = running_link();
    for uptime in 1..=5u32 {
        let msg = Message::GetStatus(Status {
            uptime,
            transmission_errors: 0,
        });
        handle.feed(&msg.encode());
    }

    for uptime in 1..=5u32 {
        match link.wait_for_message_timeout(Duration::from_secs(2)) {
            Some(Message::GetStatus(status)) => assert_eq!(status.uptime, uptime),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[test]
fn wait_for_message_blocks_until_reply() {
    let (link, handle) = running_link();
    let feeder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.feed(&Message::new(MsgType::GetVersion).encode());
    });

    let msg = link.wait_for_message();
    assert_eq!(msg.msg_type(), Some(MsgType::GetVersion));
    feeder.join().expect("feeder should finish");
}

#[test]
fn write_failure_disconnects_and_later_sends_are_dropped() {
    let (link, handle) = running_link();
    handle.fail_next_write();
    link.put_message(Message::new(MsgType::GetStatus));

    eventually("disconnect", || !link.is_connected());
    assert!(!handle.is_open());

    link.put_message(Message::new(MsgType::GetStatus));
    link.put_message(Message::new(MsgType::GetVersion));
    eventually("queue drained", || link.pending_transmit() == 0);
    eventually("drops counted", || link.stats().dropped_while_disconnected == 2);
    assert!(handle.written().is_empty());
}

#[test]
fn read_failure_disconnects() {
    let (link, handle) = running_link();
    handle.fail_next_read();
    handle.feed(&[0u8; PACKET_SIZE]);

    eventually("disconnect", || !link.is_connected());
    assert_eq!(link.get_message(), None);
    assert_eq!(link.stats().io_failures, 1);
}

#[test]
fn short_read_is_discarded_and_link_stays_up() {
    let (link, handle) = running_link();
    handle.feed(&[3, 0, 0x39, 0x30]);

    eventually("incomplete frame counted", || {
        link.stats().incomplete_frames == 1
    });
    assert!(link.is_connected());
    assert_eq!(link.get_message(), None);

    handle.feed(&Message::new(MsgType::GetVersion).encode());
    let msg = link.wait_for_message_timeout(Duration::from_secs(2));
    assert_eq!(msg, Some(Message::new(MsgType::GetVersion)));
}

#[test]
fn reconnect_while_running_replaces_port() {
    let (link, handle) = running_link();
    handle.fail_next_write();
    link.put_message(Message::new(MsgType::Nop));
    eventually("disconnect", || !link.is_connected());

    link.connect(DEVICE, 115_200, ConnectOptions::default())
        .expect("reconnect should succeed");
    assert!(link.is_connected());
    assert_eq!(handle.open_count(), 2);

    link.put_message(Message::new(MsgType::GetVersion));
    eventually("frame written", || handle.written().len() == 1);
}

#[test]
fn queue_calls_never_block() {
    let link = LinkManager::new(LoopbackOpener::new());
    let started = Instant::now();
    assert_eq!(link.get_message(), None);
    for _ in 0..1000 {
        link.put_message(Message::new(MsgType::Nop));
    }
    assert_eq!(link.pending_transmit(), 1000);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(link.wait_for_message_timeout(Duration::from_millis(20)), None);
}

#[test]
fn stop_without_start_closes_port() {
    let opener = LoopbackOpener::new();
    let handle = opener.handle();
    let link = LinkManager::new(opener);
    link.connect(DEVICE, 9600, ConnectOptions::default())
        .expect("loopback connect should succeed");

    link.stop();
    link.stop();
    assert!(!link.is_connected());
    assert!(!handle.is_open());
    link.join().expect("service loop should join");
}

#[test]
fn stopped_loop_closes_its_port() {
    let (link, handle) = running_link();
    assert!(link.is_running());

    link.stop();
    link.join().expect("service loop should join");
    assert!(!link.is_running());
    assert!(!handle.is_open());
}

#[test]
fn reconnect_after_stop_keeps_new_port() {
    let opener = LoopbackOpener::new();
    let handle = opener.handle();
    let config = LinkConfig {
        poll_interval: Duration::from_millis(50),
        stop_grace: Duration::ZERO,
        ..LinkConfig::default()
    };
    let link = LinkManager::with_config(opener, config);
    link.connect(DEVICE, 115_200, ConnectOptions::default())
        .expect("loopback connect should succeed");
    link.start().expect("service loop should start");

    link.stop();
    link.connect(DEVICE, 115_200, ConnectOptions::default())
        .expect("reconnect should succeed");
    thread::sleep(Duration::from_millis(150));

    assert!(!link.is_running());
    assert!(link.is_connected());
    assert!(handle.is_open());
    link.join().expect("service loop should join");
    assert!(link.is_connected());
}

#[test]
fn second_start_is_rejected() {
    let (link, _handle) = running_link();
    assert!(matches!(link.start(), Err(LinkError::AlreadyRunning)));
}

#[test]
fn restart_after_join() {
    let (link, handle) = running_link();
    link.stop();
    link.join().expect("service loop should join");

    link.connect(DEVICE, 115_200, ConnectOptions::default())
        .expect("reconnect should succeed");
    link.start().expect("service loop should restart");
    link.put_message(Message::new(MsgType::GetStatus));
    eventually("frame written", || handle.written().len() == 1);
}

#[test]
fn open_failure_is_returned() {
    let opener = LoopbackOpener::new();
    opener.handle().set_fail_open(true);
    let link = LinkManager::new(opener);

    let err = link
        .connect(DEVICE, 115_200, ConnectOptions::default())
        .expect_err("refused open should fail");
    match err {
        LinkError::Transport(TransportError::Open { path, .. }) => assert_eq!(path, DEVICE),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!link.is_connected());
}

#[test]
fn packet_size_mismatch_fails_connect() {
    let config = LinkConfig {
        packet_size: 32,
        ..LinkConfig::default()
    };
    let opener = LoopbackOpener::new();
    let handle = opener.handle();
    let link = LinkManager::with_config(opener, config);

    assert!(matches!(
        link.connect(DEVICE, 115_200, ConnectOptions::default()),
        Err(LinkError::PacketSizeMismatch {
            configured: 32,
            codec: 16
        })
    ));
    assert_eq!(handle.open_count(), 0);
}

#[test]
fn drop_stops_the_service_loop() {
    let (link, handle) = running_link();
    drop(link);
    assert!(!handle.is_open());
}

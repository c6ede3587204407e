//! Drive a simulated joint controller through the link manager.
//!
//! The "device" runs on its own thread behind a loopback port: it decodes
//! every frame the link writes and answers getters the way the firmware
//! does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jointlink::codec::{JointMoveSpeed, JointsPositionSpeed, Message, MsgType, Status, Version};
use jointlink::link::{ConnectOptions, LinkManager};
use jointlink::transport::{LoopbackHandle, LoopbackOpener};

fn run_device(handle: LoopbackHandle, running: Arc<AtomicBool>) {
    let booted = Instant::now();
    let mut joints = JointsPositionSpeed::default();

    while running.load(Ordering::SeqCst) {
        for frame in handle.take_written() {
            let uptime = booted.elapsed().as_millis() as u32;
            let reply = match Message::decode(&frame) {
                Message::SetJointsPositionSpeed(target) => {
                    joints = target;
                    None
                }
                Message::GetJointsPositionSpeed(_) => Some(Message::GetJointsPositionSpeed(joints)),
                Message::GetStatus(_) => Some(Message::GetStatus(Status {
                    uptime,
                    transmission_errors: 0,
                })),
                Message::GetVersion(_) => Some(Message::GetVersion(Version {
                    uptime,
                    major: 1,
                    minor: 2,
                })),
                Message::Nop(_) | Message::Unknown { .. } => None,
            };
            if let Some(reply) = reply {
                handle.feed(&reply.encode());
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opener = LoopbackOpener::new();
    let running = Arc::new(AtomicBool::new(true));
    let device = {
        let handle = opener.handle();
        let running = Arc::clone(&running);
        thread::spawn(move || run_device(handle, running))
    };

    let link = LinkManager::new(opener);
    link.connect("/dev/ttyACM0", 115_200, ConnectOptions::default())?;
    link.start()?;

    let mut target = JointsPositionSpeed::default();
    target.joints[0] = JointMoveSpeed {
        position: 50,
        speed: 100,
    };
    link.put_message(Message::SetJointsPositionSpeed(target));

    for ty in [
        MsgType::GetVersion,
        MsgType::GetStatus,
        MsgType::GetJointsPositionSpeed,
    ] {
        link.put_message(Message::new(ty));
        match link.wait_for_message_timeout(Duration::from_secs(1)) {
            Some(reply) => println!("{reply}"),
            None => println!("{}: no reply", ty.name()),
        }
    }

    println!("stats: {:?}", link.stats());

    link.stop();
    link.join()?;
    running.store(false, Ordering::SeqCst);
    device.join().map_err(|_| "device thread panicked")?;
    Ok(())
}

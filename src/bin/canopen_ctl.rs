//! `canopen_ctl CAN_DEVICE CAN_DEVICE_TYPE NODE_ID:hex CMD [args]`
//!
//! A thin illustrative driver loop wiring a Linux SocketCAN interface to
//! [`canopen_master::StateMachine`]. `CAN_DEVICE_TYPE` is accepted for
//! compatibility with the original command line but unused — `socketcan`
//! only ever talks to Linux SocketCAN interfaces.

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use canopen_master::nmt::NodeStateTransition;
use canopen_master::socketcan_adapter;
use canopen_master::{Frame, StateMachine, Timestamp, UpdateMode};
use socketcan::Socket;

fn usage() -> ExitCode {
    eprintln!("canopen_ctl CAN_DEVICE CAN_DEVICE_TYPE NODE_ID CMD [args]");
    eprintln!("  all object IDs and sub-IDs are in hexadecimal without a 0x prefix");
    eprintln!();
    eprintln!("  state-get [--query]");
    eprintln!("  state-set {{START|STOP|ENTER_PRE_OPERATIONAL|RESET|RESET_COMMUNICATION}}");
    eprintln!("  sdo-get OBJ SUB");
    eprintln!("  sdo-set OBJ SUB B0 [B1 [B2 [B3]]]");
    eprintln!("  sync");
    eprintln!("  read");
    ExitCode::FAILURE
}

fn parse_transition(text: &str) -> Option<NodeStateTransition> {
    match text {
        "START" => Some(NodeStateTransition::Start),
        "STOP" => Some(NodeStateTransition::Stop),
        "ENTER_PRE_OPERATIONAL" => Some(NodeStateTransition::EnterPreOperational),
        "RESET" => Some(NodeStateTransition::Reset),
        "RESET_COMMUNICATION" => Some(NodeStateTransition::ResetCommunication),
        _ => None,
    }
}

fn format_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        return usage();
    }

    let can_device = &args[1];
    let node_id: u8 = match u8::from_str_radix(&args[3], 16) {
        Ok(v) => v,
        Err(_) => return usage(),
    };
    let cmd = args[4].as_str();

    let socket = match socketcan::CanSocket::open(can_device) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("failed to open {can_device}: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _ = socket.set_read_timeout(Duration::from_secs(2));

    let mut canopen = StateMachine::new(node_id);
    let mut next_tick: u64 = 1;
    let mut read_frame = || -> Option<Frame> {
        let raw = socket.read_frame().ok()?;
        let time = Timestamp::from_ticks(next_tick);
        next_tick += 1;
        socketcan_adapter::from_socketcan(&raw, time).ok()
    };
    let send = |frame: &Frame| {
        if let Ok(raw) = socketcan_adapter::to_socketcan(frame) {
            let _ = socket.write_frame(&raw);
        }
    };

    match cmd {
        "state-get" => {
            if args.len() != 5 && !(args.len() == 6 && args[5] == "--query") {
                return usage();
            }
            let use_query = args.len() == 6;

            if use_query {
                send(&canopen.query_state());
            } else {
                // Requesting a write to the producer heartbeat time is a
                // common way to make a node start producing heartbeats.
                let download = canopen
                    .download(0x1017, 0, &[10, 0, 0])
                    .expect("a fresh dictionary has no declared size for 0x1017:0 yet");
                send(&download);
            }

            loop {
                let Some(frame) = read_frame() else { continue };
                if let Ok(update) = canopen.process(&frame) {
                    if update.mode == UpdateMode::Heartbeat {
                        println!("{:?}", canopen.node_state());
                        break;
                    }
                }
            }

            if !use_query {
                if let Ok(download) = canopen.download(0x1017, 0, &[0, 0, 0]) {
                    send(&download);
                }
            }
        }
        "state-set" => {
            let Some(text) = args.get(5) else { return usage() };
            let Some(transition) = parse_transition(text) else { return usage() };
            send(&canopen.query_state_transition(transition));
        }
        "sdo-get" => {
            let (Some(obj_text), Some(sub_text)) = (args.get(5), args.get(6)) else {
                return usage();
            };
            let (Ok(object_id), Ok(sub_id)) = (u16::from_str_radix(obj_text, 16), sub_text.parse::<u8>()) else {
                return usage();
            };

            send(&canopen.upload(object_id, sub_id));
            loop {
                let Some(frame) = read_frame() else { continue };
                if let Ok(update) = canopen.process(&frame) {
                    if update.updated.contains(&(object_id, sub_id)) {
                        let mut buf = [0u8; 4];
                        let size = canopen
                            .dictionary()
                            .get_raw(object_id, sub_id, &mut buf)
                            .unwrap_or(0);
                        println!("{}", format_bytes(&buf[..size]));
                        break;
                    }
                }
            }
        }
        "sdo-set" => {
            if args.len() < 8 {
                return usage();
            }
            let (Ok(object_id), Ok(sub_id)) = (u16::from_str_radix(&args[5], 16), args[6].parse::<u8>()) else {
                return usage();
            };
            let mut data = Vec::with_capacity(4);
            for byte_text in &args[7..] {
                match u8::from_str_radix(byte_text, 16) {
                    Ok(byte) => data.push(byte),
                    Err(_) => return usage(),
                }
            }

            let download = match canopen.download(object_id, sub_id, &data) {
                Ok(frame) => frame,
                Err(e) => {
                    eprintln!("{e}");
                    return ExitCode::FAILURE;
                }
            };
            send(&download);

            loop {
                let Some(frame) = read_frame() else { continue };
                match canopen.process(&frame) {
                    Ok(update) if update.mode == UpdateMode::SdoInitiateDownload => break,
                    Ok(update) => println!("unexpected message with mode {:?}", update.mode),
                    Err(e) => println!("unexpected message: {e}"),
                }
            }
        }
        "sync" => send(&canopen.sync()),
        "read" => {
            if let Some(frame) = read_frame() {
                println!(
                    "can_id={:#06x} size={} {}",
                    frame.can_id,
                    frame.size,
                    format_bytes(frame.payload())
                );
            }
        }
        other => {
            eprintln!("unknown subcommand {other}");
            return usage();
        }
    }

    ExitCode::SUCCESS
}

//! imu-bridge - line-protocol IMU telemetry to CAN
//!
//! Usage:
//!   imu-bridge                      Run with config.toml (serial, auto-detect)
//!   imu-bridge --transport udp      Run against a local UDP simulator
//!   imu-bridge layout               Print the CAN frame layout
//!   imu-bridge ports                List serial ports
//!   imu-bridge parse "1,2,3,4,5,6"  Show frames and reply for one line

use clap::Parser;
use imu_can_bridge::bridge::{self, Stats};
use imu_can_bridge::can::{BusError, CanBus, CanFrame, FrameLayout, Packetizer};
use imu_can_bridge::cli::{Cli, Command};
use imu_can_bridge::config::{self, Config};
use imu_can_bridge::logging;
use imu_can_bridge::protocol::{ControlWord, ParsedLine, RecordParser, Response};
use imu_can_bridge::transport::serial::describe_ports;
use imu_can_bridge::{BridgeError, Result};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_bridge(config),
        Command::Layout => {
            print_layout(config.can.layout);
            Ok(())
        }
        Command::Ports => {
            let ports = describe_ports();
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("{}", port);
            }
            Ok(())
        }
        Command::Parse { line } => {
            print_parse(&config, &line);
            Ok(())
        }
    }
}

fn run_bridge(config: Config) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| BridgeError::Runtime { source: e })?;

    rt.block_on(async {
        // Setup shutdown handler
        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_signal_handler(shutdown.clone());

        let stats = Arc::new(Stats::new());
        bridge::run(&config, shutdown, stats).await
    })
}

fn spawn_signal_handler(shutdown: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(mut sigterm), Ok(mut sigint)) => {
                    tokio::select! {
                        _ = sigterm.recv() => {},
                        _ = sigint.recv() => {},
                    }
                }
                _ => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.store(true, Ordering::SeqCst);
        });
    }
}

fn print_layout(layout: FrameLayout) {
    println!("Layout: {} ({} frames, little-endian f32)", layout, layout.frame_count());
    for slot in layout.slots() {
        let names: Vec<&str> = slot.fields.iter().map(|f| f.name()).collect();
        println!("  0x{:03X}  [{}]  {}", slot.id, slot.len(), names.join(", "));
    }
}

fn print_parse(config: &Config, line: &str) {
    let parser = RecordParser::new(config.protocol.parse_mode());

    let reply = match parser.parse(line) {
        Ok(ParsedLine::Empty) => {
            println!("empty line, no reply");
            return;
        }
        Ok(ParsedLine::Control(ControlWord::Ping)) => Response::Pong,
        Ok(ParsedLine::Telemetry(record)) => {
            println!("{:?}", record);
            let mut packetizer =
                Packetizer::new(config.can.layout, PrintBus, Arc::new(Stats::new()));
            Response::from_pack(&packetizer.pack(&record))
        }
        Err(e) => {
            println!("rejected: {}", e);
            Response::BadRecord
        }
    };

    print!("{}", reply.to_line());
}

/// Bus for `parse`: prints each frame instead of sending it
struct PrintBus;

impl CanBus for PrintBus {
    fn name(&self) -> &str {
        "stdout"
    }

    fn ensure_ready(&mut self) -> bool {
        true
    }

    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), BusError> {
        println!("  {}", frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imu_can_bridge::protocol::TelemetryRecord;

    #[test]
    fn test_print_bus_takes_every_frame_once() {
        let stats = Arc::new(Stats::new());
        let mut packetizer = Packetizer::new(FrameLayout::FourFrame, PrintBus, stats.clone());
        let record = TelemetryRecord::from_fields([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(Response::from_pack(&packetizer.pack(&record)), Response::Ack);
        assert_eq!(stats.snapshot().frames_sent, 4);
    }
}

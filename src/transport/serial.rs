//! Serial transport for the UART / USB-CDC hop
//!
//! Uses blocking threads for low-latency I/O:
//! - Reader thread: reads from serial port, sends to channel
//! - Writer thread: receives from channel, writes to serial port
//!
//! The link is reported connected as soon as the port is open. The transport
//! stops when:
//! - `shutdown` flag is set
//! - Serial port disconnects (detected via consecutive read errors)
//! - Write error occurs

use super::{link_channel, Transport, TransportChannels};
use crate::config::DeviceConfig;
use crate::constants::{CHANNEL_CAPACITY, READ_BUFFER_SIZE, SERIAL_DISCONNECT_THRESHOLD};
use crate::error::{BridgeError, Result};
use bytes::Bytes;
use serialport::{SerialPortInfo, SerialPortType};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Serial transport for the upstream microcontroller
///
/// # Example
///
/// ```ignore
/// // Auto-detect device using preset config
/// let device = config::load_device_preset("xiao-esp32c3")?;
/// let port = SerialTransport::detect(&device)?;
/// let channels = SerialTransport::new(&port, 115_200).spawn(shutdown)?;
/// ```
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Create a new serial transport for the specified port
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
        }
    }

    /// Detect a USB device matching the given configuration
    ///
    /// Searches available serial ports for a device matching the VID/PID
    /// specified in the config. Falls back to name pattern matching if
    /// VID/PID info is not available.
    ///
    /// # Errors
    ///
    /// - `NoDeviceFound` - No matching device found
    /// - `MultipleDevicesFound` - More than one matching device found
    pub fn detect(config: &DeviceConfig) -> Result<String> {
        let ports = serialport::available_ports().unwrap_or_default();

        let matching: Vec<_> = ports.iter().filter(|p| matches_device(p, config)).collect();

        match matching.len() {
            0 => Err(BridgeError::NoDeviceFound),
            1 => Ok(matching[0].port_name.clone()),
            n => Err(BridgeError::MultipleDevicesFound { count: n }),
        }
    }

    /// Open a serial port with a short read timeout
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
        serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|e| BridgeError::SerialOpen {
                port: port_name.to_string(),
                source: std::io::Error::other(e.to_string()),
            })
    }
}

/// Check if a serial port matches the device configuration
fn matches_device(port: &SerialPortInfo, config: &DeviceConfig) -> bool {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => usb.vid == config.vid && config.pid_list.contains(&usb.pid),
        _ => {
            // Fallback: name pattern matching if available
            config
                .name_hint
                .current()
                .map(|hint| port.port_name.contains(hint))
                .unwrap_or(false)
        }
    }
}

/// Human-readable listing of available ports (for the `ports` command)
pub fn describe_ports() -> Vec<String> {
    serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => format!(
                "{}  usb {:04x}:{:04x}  {}",
                p.port_name,
                usb.vid,
                usb.pid,
                usb.product.unwrap_or_default()
            ),
            SerialPortType::PciPort => format!("{}  pci", p.port_name),
            SerialPortType::BluetoothPort => format!("{}  bluetooth", p.port_name),
            SerialPortType::Unknown => p.port_name,
        })
        .collect()
}

impl Transport for SerialTransport {
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<TransportChannels> {
        let (in_tx, in_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let (out_tx, mut out_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

        // Open serial port
        let port_read = Self::open(&self.port_name, self.baud_rate)?;
        let port_write = port_read.try_clone().map_err(|e| BridgeError::SerialOpen {
            port: self.port_name.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

        info!("Serial {} open @ {} baud", self.port_name, self.baud_rate);
        let (link_tx, link) = link_channel(true);

        // Reader thread (blocking), owns the link notifier
        let shutdown_reader = shutdown.clone();
        let port_name = self.port_name.clone();
        std::thread::spawn(move || {
            let mut port = port_read;
            let mut buf = [0u8; READ_BUFFER_SIZE];
            let mut consecutive_errors = 0u32;

            while !shutdown_reader.load(Ordering::Relaxed) {
                match port.read(&mut buf) {
                    Ok(n) if n > 0 => {
                        consecutive_errors = 0;
                        if in_tx
                            .blocking_send(Bytes::copy_from_slice(&buf[..n]))
                            .is_err()
                        {
                            // Channel closed, receiver dropped
                            break;
                        }
                    }
                    Ok(_) => {
                        // Zero bytes read - could be normal or port gone
                        consecutive_errors += 1;
                        if consecutive_errors > SERIAL_DISCONNECT_THRESHOLD {
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        consecutive_errors = 0;
                    }
                    Err(e) => {
                        debug!("Serial {} read error: {}", port_name, e);
                        break;
                    }
                }
            }
            link_tx.set_connected(false);
            // Channel will be closed when in_tx is dropped
        });

        // Writer thread (blocking)
        let shutdown_writer = shutdown;
        std::thread::spawn(move || {
            let mut port = port_write;

            while !shutdown_writer.load(Ordering::Relaxed) {
                match out_rx.blocking_recv() {
                    Some(data) => {
                        if port.write_all(&data).is_err() {
                            // Write error - port disconnected
                            break;
                        }
                    }
                    None => break,
                }
            }
        });

        Ok(TransportChannels {
            rx: in_rx,
            tx: out_tx,
            link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformNameHint;

    #[test]
    fn test_serial_transport_new() {
        let transport = SerialTransport::new("COM3", 115_200);
        assert_eq!(transport.port_name, "COM3");
        assert_eq!(transport.baud_rate, 115_200);
    }

    #[test]
    fn test_serial_transport_from_string() {
        let transport = SerialTransport::new(String::from("/dev/ttyACM0"), 9600);
        assert_eq!(transport.port_name, "/dev/ttyACM0");
    }

    #[test]
    fn test_matches_device_by_vid_pid() {
        let config = DeviceConfig {
            name: "XIAO ESP32-C3".into(),
            vid: 0x303A,
            pid_list: vec![0x1001],
            name_hint: PlatformNameHint::default(),
        };
        let port = SerialPortInfo {
            port_name: "/dev/ttyACM0".into(),
            port_type: SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid: 0x303A,
                pid: 0x1001,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        };
        assert!(matches_device(&port, &config));

        let other = SerialPortInfo {
            port_name: "/dev/ttyACM1".into(),
            port_type: SerialPortType::UsbPort(serialport::UsbPortInfo {
                vid: 0x2E8A,
                pid: 0x000A,
                serial_number: None,
                manufacturer: None,
                product: None,
            }),
        };
        assert!(!matches_device(&other, &config));
    }
}

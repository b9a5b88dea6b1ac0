//! Integration tests for the line-to-CAN bridge
//!
//! Tests the complete data flow through a session using mock transports
//! and a recording CAN bus.

use bytes::Bytes;
use imu_can_bridge::bridge::{self, BridgeSession, SessionOptions, Stats};
use imu_can_bridge::can::{BusError, CanBus, CanFrame, FrameLayout};
use imu_can_bridge::config::{CanBackend, Config, UpstreamTransport};
use imu_can_bridge::protocol::ParseMode;
use imu_can_bridge::transport::{link_channel, LinkNotifier, Transport, TransportChannels};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// Mock Transport
// =============================================================================

/// Mock transport for testing the bridge without real I/O
pub struct MockTransport {
    /// Data to be received by the bridge (simulates upstream input)
    rx_data: Vec<Bytes>,
    /// Captured replies sent by the bridge
    tx_captured: Arc<tokio::sync::Mutex<Vec<Bytes>>>,
    /// Initial link state
    connected: bool,
    /// Notifier handed back to the test after spawn
    notifier: Arc<Mutex<Option<LinkNotifier>>>,
}

impl MockTransport {
    /// Create a new mock transport with predefined receive data
    pub fn new(rx_data: Vec<Bytes>, connected: bool) -> Self {
        Self {
            rx_data,
            tx_captured: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            connected,
            notifier: Arc::new(Mutex::new(None)),
        }
    }

    /// Get captured transmitted data
    pub fn captured(&self) -> Arc<tokio::sync::Mutex<Vec<Bytes>>> {
        self.tx_captured.clone()
    }

    /// Slot receiving the link notifier once spawned
    pub fn notifier(&self) -> Arc<Mutex<Option<LinkNotifier>>> {
        self.notifier.clone()
    }
}

impl Transport for MockTransport {
    fn spawn(self, _shutdown: Arc<AtomicBool>) -> imu_can_bridge::Result<TransportChannels> {
        let (tx_to_bridge, rx_from_mock) = mpsc::channel::<Bytes>(16);
        let (tx_from_bridge, mut rx_to_capture) = mpsc::channel::<Bytes>(16);
        let (link_tx, link) = link_channel(self.connected);
        *self.notifier.lock() = Some(link_tx);

        let tx_captured = self.tx_captured.clone();

        // Spawn task to capture transmitted data
        tokio::spawn(async move {
            while let Some(data) = rx_to_capture.recv().await {
                tx_captured.lock().await.push(data);
            }
        });

        // Send predefined data to bridge, then keep the channel open
        let rx_data = self.rx_data;
        tokio::spawn(async move {
            for data in rx_data {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if tx_to_bridge.send(data).await.is_err() {
                    return;
                }
            }
            tx_to_bridge.closed().await;
        });

        Ok(TransportChannels {
            rx: rx_from_mock,
            tx: tx_from_bridge,
            link,
        })
    }
}

// =============================================================================
// Recording bus
// =============================================================================

#[derive(Clone, Default)]
struct RecordingBus {
    ready: bool,
    frames: Arc<Mutex<Vec<CanFrame>>>,
}

impl RecordingBus {
    fn ready() -> Self {
        Self {
            ready: true,
            ..Self::default()
        }
    }

    fn frames(&self) -> Vec<CanFrame> {
        self.frames.lock().clone()
    }
}

impl CanBus for RecordingBus {
    fn name(&self) -> &str {
        "recording"
    }

    fn ensure_ready(&mut self) -> bool {
        self.ready
    }

    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        self.frames.lock().push(*frame);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn options(layout: FrameLayout) -> SessionOptions {
    SessionOptions {
        line_capacity: 128,
        mode: ParseMode::Lenient,
        layout,
        heartbeat: None,
    }
}

/// Run one session over `input` and return the replies
async fn run_session(
    input: Vec<Bytes>,
    connected: bool,
    layout: FrameLayout,
    bus: RecordingBus,
) -> Vec<String> {
    let mock = MockTransport::new(input, connected);
    let captured = mock.captured();
    // Dropping the notifier would end the session
    let _notifier = mock.notifier();
    let shutdown = Arc::new(AtomicBool::new(false));
    let channels = mock.spawn(shutdown.clone()).unwrap();

    let mut session = BridgeSession::new(options(layout), bus, Arc::new(Stats::new()));
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move { session.run(channels, shutdown_clone).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.store(true, Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    let replies = captured.lock().await;
    replies
        .iter()
        .map(|b| String::from_utf8(b.to_vec()).unwrap())
        .collect()
}

// =============================================================================
// Line protocol scenarios
// =============================================================================

#[tokio::test]
async fn test_three_frame_record_is_acked() {
    let bus = RecordingBus::ready();
    let replies = run_session(
        vec![Bytes::from_static(b"1.0,2.0,3.0,4.0,5.0,6.0\n")],
        true,
        FrameLayout::ThreeFrame,
        bus.clone(),
    )
    .await;

    assert_eq!(replies, vec!["WEBUSB_CONNECTED_CALLBACK\n", "ACK\n"]);

    let frames = bus.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].id(), 0x501);
    assert_eq!(frames[0].floats(), vec![1.0, 2.0]);
    assert_eq!(frames[1].id(), 0x502);
    assert_eq!(frames[1].floats(), vec![3.0, 4.0]);
    assert_eq!(frames[2].id(), 0x503);
    assert_eq!(frames[2].floats(), vec![5.0, 6.0]);
}

#[tokio::test]
async fn test_bus_not_initialized() {
    let bus = RecordingBus::default();
    let replies = run_session(
        vec![Bytes::from_static(b"1.0,2.0,3.0,4.0,5.0,6.0\n")],
        true,
        FrameLayout::ThreeFrame,
        bus.clone(),
    )
    .await;

    assert_eq!(replies, vec!["WEBUSB_CONNECTED_CALLBACK\n", "ERR:NO_CAN_INIT\n"]);
    assert!(bus.frames().is_empty());
}

#[tokio::test]
async fn test_ping_pong() {
    let bus = RecordingBus::ready();
    let replies = run_session(
        vec![Bytes::from_static(b"ping\n")],
        true,
        FrameLayout::FourFrame,
        bus.clone(),
    )
    .await;

    assert_eq!(replies, vec!["WEBUSB_CONNECTED_CALLBACK\n", "PONG\n"]);
    assert!(bus.frames().is_empty());
}

#[tokio::test]
async fn test_short_record_zero_filled() {
    let bus = RecordingBus::ready();
    let replies = run_session(
        vec![Bytes::from_static(b"1.0,2.0,3.0\n")],
        true,
        FrameLayout::FourFrame,
        bus.clone(),
    )
    .await;

    assert_eq!(replies.last().map(String::as_str), Some("ACK\n"));

    let frames = bus.frames();
    let ids: Vec<u16> = frames.iter().map(|f| f.id()).collect();
    assert_eq!(ids, vec![0x501, 0x502, 0x503, 0x504]);
    assert_eq!(frames[0].floats(), vec![1.0, 2.0]);
    assert_eq!(frames[1].floats(), vec![3.0]);
    assert_eq!(frames[2].floats(), vec![0.0, 0.0]);
    assert_eq!(frames[3].floats(), vec![0.0]);
}

#[tokio::test]
async fn test_overlong_line_split_across_reads() {
    // 300 bytes without terminator, then the terminator in a later read
    let mut long = b"7.5,".to_vec();
    long.resize(300, b'1');

    let bus = RecordingBus::ready();
    let replies = run_session(
        vec![Bytes::from(long), Bytes::from_static(b"\nping\n")],
        true,
        FrameLayout::ThreeFrame,
        bus.clone(),
    )
    .await;

    // One reply for the truncated line, the next line is unaffected
    assert_eq!(
        replies,
        vec!["WEBUSB_CONNECTED_CALLBACK\n", "ACK\n", "PONG\n"]
    );
    let frames = bus.frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].floats()[0], 7.5);
}

#[tokio::test]
async fn test_no_replies_until_link_up() {
    let mock = MockTransport::new(vec![Bytes::from_static(b"ping\n")], false);
    let captured = mock.captured();
    let notifier = mock.notifier();
    let shutdown = Arc::new(AtomicBool::new(false));
    let channels = mock.spawn(shutdown.clone()).unwrap();

    let bus = RecordingBus::ready();
    let mut session = BridgeSession::new(options(FrameLayout::FourFrame), bus, Arc::new(Stats::new()));
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(async move { session.run(channels, shutdown_clone).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(captured.lock().await.is_empty());

    if let Some(link) = notifier.lock().as_ref() {
        link.set_connected(true);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.store(true, Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    let replies = captured.lock().await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].as_ref(), b"WEBUSB_CONNECTED_CALLBACK\n");
}

// =============================================================================
// UDP end-to-end
// =============================================================================

#[tokio::test]
async fn test_udp_bridge_end_to_end() {
    const PORT: u16 = 39117;

    let mut config = Config::default();
    config.bridge.transport = UpstreamTransport::Udp;
    config.bridge.udp_port = PORT;
    config.can.backend = CanBackend::Log;
    config.protocol.heartbeat_interval_ms = 0;

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(Stats::new());
    let shutdown_clone = shutdown.clone();
    let stats_clone = stats.clone();
    let handle =
        tokio::spawn(async move { bridge::run(&config, shutdown_clone, stats_clone).await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(("127.0.0.1", PORT)).await.unwrap();
    client.send(b"ping\n").await.unwrap();

    let mut replies = Vec::new();
    let mut buf = [0u8; 64];
    while replies.len() < 2 {
        let n = tokio::time::timeout(Duration::from_secs(1), client.recv(&mut buf))
            .await
            .expect("reply timed out")
            .unwrap();
        replies.push(String::from_utf8_lossy(&buf[..n]).into_owned());
    }
    assert_eq!(replies, vec!["WEBUSB_CONNECTED_CALLBACK\n", "PONG\n"]);

    client.send(b"1,2,3,4,5,6\n").await.unwrap();
    let n = tokio::time::timeout(Duration::from_secs(1), client.recv(&mut buf))
        .await
        .expect("reply timed out")
        .unwrap();
    assert_eq!(&buf[..n], b"ACK\n");

    shutdown.store(true, Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.pings, 1);
    assert_eq!(snapshot.records, 1);
    assert_eq!(snapshot.frames_sent, 4);
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_text(ws: &mut WsClient) -> String {
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    loop {
        let msg = tokio::time::timeout(Duration::from_secs(1), ws.next())
            .await
            .expect("reply timed out")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test]
async fn test_websocket_replacement_client() {
    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    const PORT: u16 = 39118;

    let mut config = Config::default();
    config.bridge.transport = UpstreamTransport::WebSocket;
    config.bridge.websocket_port = PORT;
    config.can.backend = CanBackend::Log;
    config.protocol.heartbeat_interval_ms = 0;

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(Stats::new());
    let shutdown_clone = shutdown.clone();
    let stats_clone = stats.clone();
    let handle =
        tokio::spawn(async move { bridge::run(&config, shutdown_clone, stats_clone).await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let url = format!("ws://127.0.0.1:{}", PORT);
    let (mut first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert_eq!(next_text(&mut first).await, "WEBUSB_CONNECTED_CALLBACK\n");

    // Second client takes over while the first is still open
    let (mut second, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert_eq!(next_text(&mut second).await, "WEBUSB_CONNECTED_CALLBACK\n");

    // The replaced client no longer reaches the bridge
    let _ = first.send(Message::text("ping\n".to_string())).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    second
        .send(Message::text("1,2,3,4,5,6\n".to_string()))
        .await
        .unwrap();
    assert_eq!(next_text(&mut second).await, "ACK\n");

    shutdown.store(true, Ordering::SeqCst);
    handle.await.unwrap().unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.pings, 0);
    assert_eq!(snapshot.records, 1);
    assert_eq!(snapshot.frames_sent, 4);
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_shipped_default_config_parses() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let config = imu_can_bridge::config::load(Some(&path)).expect("default.toml");

    assert!(config.validate().is_ok());
    assert_eq!(config.can.layout, FrameLayout::FourFrame);
    assert_eq!(config.bridge.device_preset.as_deref(), Some("xiao-esp32c3"));
}

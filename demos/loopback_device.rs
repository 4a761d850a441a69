//! Example: Drive a simulated device over TCP.
//!
//! This example demonstrates how to:
//! - Connect a bridge through the supervised TCP link
//! - Run the bridge on its own task and talk to it with requests
//! - Follow progress through the event stream
//!
//! A loopback task plays the device: it acknowledges each command with an
//! `IDLE` status after the planned duration (scaled down).
//!
//! Run with: `cargo run --example loopback_device`

use std::time::Duration;

use palletizer_motion::{
    bridge::{self, BridgeRequest, DeviceMessage, DeviceStatus, OutboundMessage, WireCommand},
    BridgeEvent, SystemConfig,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

const SCRIPT: &str = "HOME\nLOOP(2){ Z(0); G(1); Z(500); GROUP(X(1200), Y(300)); G(0); }\nX(0)";

/// Simulated device: acknowledges every command after a short delay.
async fn loopback_device(listener: TcpListener) -> std::io::Result<()> {
    let (socket, peer) = listener.accept().await?;
    info!(%peer, "bridge connected to loopback device");
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let message: OutboundMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(err) => {
                warn!(%err, "device got malformed command");
                continue;
            }
        };
        if message.cmd == WireCommand::Stop {
            info!("device stopped");
            continue;
        }
        if !message.data["expect_response"].as_bool().unwrap_or(true) {
            continue;
        }

        let duration = message.data["duration"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(duration / 20)).await;

        let reply = DeviceMessage::Status {
            status: DeviceStatus::Idle,
            position: None,
        };
        let mut encoded = serde_json::to_vec(&reply).unwrap_or_default();
        encoded.push(b'\n');
        write_half.write_all(&encoded).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let mut config = SystemConfig::default();
    config.bridge.address = listener.local_addr()?.to_string();
    config.bridge.reconnect_interval_ms = 100;
    tokio::spawn(loopback_device(listener));

    let (link, link_events, supervisor) =
        bridge::spawn_tcp_link(config.bridge.address.clone(), config.bridge.reconnect_interval());
    let bridge = bridge::ProtocolBridge::new(link, &config);
    let mut events = bridge.subscribe();

    let (requests, rx) = mpsc::channel(16);
    let runner = tokio::spawn(bridge::run(bridge, link_events, rx));

    let (reply, ids) = oneshot::channel();
    requests
        .send(BridgeRequest::LoadScript {
            source: SCRIPT.to_string(),
            reply,
        })
        .await?;
    let ids = ids.await??;
    println!("Loaded {} commands", ids.len());

    while let Ok(event) = events.recv().await {
        match event {
            BridgeEvent::Dispatched { id, action, timeout_ms } => {
                println!("-> {:>3} {:<10} (timeout {} ms)", id, action, timeout_ms)
            }
            BridgeEvent::Status(status) => {
                if status.total_commands > 0 && status.current_command_index == status.total_commands {
                    println!("Script finished: {}/{}", status.current_command_index, status.total_commands);
                    break;
                }
            }
            BridgeEvent::Failed { id, reason, terminal } => {
                println!("!! {} failed ({}), terminal: {}", id, reason, terminal)
            }
            _ => {}
        }
    }

    drop(requests);
    supervisor.abort();
    let bridge = runner.await?;
    println!("Final status: {}", serde_json::to_string(&bridge.status())?);
    Ok(())
}

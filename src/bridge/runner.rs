//! Single-task event loop driving a [`ProtocolBridge`].

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::queue::CommandId;

use super::dispatcher::ProtocolBridge;
use super::control::ControlVerb;
use super::link::{DeviceLink, LinkEvent};
use super::state::StatusSnapshot;

/// Request from a controller task.
#[derive(Debug)]
pub enum BridgeRequest {
    /// Apply a control verb.
    Control {
        /// Verb.
        verb: ControlVerb,
        /// Id of the queued command (the `STOP` for `stop`).
        reply: oneshot::Sender<CommandId>,
    },
    /// Compile and enqueue a script.
    LoadScript {
        /// MSL source.
        source: String,
        /// Enqueued ids, or the compile/planning error.
        reply: oneshot::Sender<crate::Result<Vec<CommandId>>>,
    },
    /// Read the status summary.
    Status {
        /// Snapshot.
        reply: oneshot::Sender<StatusSnapshot>,
    },
    /// Fail the in-flight command.
    FailCurrent {
        /// Reported cause.
        reason: String,
        /// Whether a command was in flight.
        reply: oneshot::Sender<bool>,
    },
}

/// Drive `bridge` until both input channels close, then return it.
///
/// Link events, controller requests, the watchdog and the periodic optimizer
/// are all handled here, so the bridge is never shared across tasks.
pub async fn run<L: DeviceLink>(
    mut bridge: ProtocolBridge<L>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
    mut requests: mpsc::Receiver<BridgeRequest>,
) -> ProtocolBridge<L> {
    let mut optimize = time::interval_at(
        Instant::now() + bridge.config().optimize_interval(),
        bridge.config().optimize_interval(),
    );
    optimize.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut links_open = true;
    let mut requests_open = true;
    info!("bridge runner started");

    while links_open || requests_open {
        let deadline = bridge.watchdog_deadline();

        tokio::select! {
            event = link_events.recv(), if links_open => match event {
                Some(event) => bridge.handle_link_event(event).await,
                None => {
                    debug!("link event stream closed");
                    links_open = false;
                    bridge.handle_link_event(LinkEvent::Disconnected).await;
                }
            },
            request = requests.recv(), if requests_open => match request {
                Some(request) => handle_request(&mut bridge, request).await,
                None => {
                    debug!("request channel closed");
                    requests_open = false;
                }
            },
            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                bridge.handle_timeout().await;
            }
            _ = optimize.tick() => {
                bridge.optimize_queue();
            }
        }
    }

    info!("bridge runner stopped");
    bridge
}

async fn handle_request<L: DeviceLink>(bridge: &mut ProtocolBridge<L>, request: BridgeRequest) {
    // A dropped reply receiver only means the caller stopped waiting.
    match request {
        BridgeRequest::Control { verb, reply } => {
            let id = bridge.control(verb).await;
            let _ = reply.send(id);
        }
        BridgeRequest::LoadScript { source, reply } => {
            let result = bridge.load_script(&source).await;
            let _ = reply.send(result);
        }
        BridgeRequest::Status { reply } => {
            let _ = reply.send(bridge.status());
        }
        BridgeRequest::FailCurrent { reason, reply } => {
            let failed = bridge.fail_current(reason).await.is_some();
            let _ = reply.send(failed);
        }
    }
}

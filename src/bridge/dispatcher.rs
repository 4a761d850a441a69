//! Device dispatcher: one queue, one link, one command in flight.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, SystemConfig};
use crate::error::{DeviceError, TimeoutError};
use crate::motion::{AxisMap, Planner};
use crate::queue::{
    CommandId, CommandQueue, DispatchOutcome, FailureCause, OptimizeReport, Priority, Resolution,
};
use crate::script::{Command, Compiler};

use super::control::ControlVerb;
use super::event::BridgeEvent;
use super::link::{DeviceLink, LinkEvent};
use super::serialize::CommandSerializer;
use super::state::{ConnectionState, DeviceState, StatusSnapshot};
use super::wire::{DeviceMessage, DeviceStatus, OutboundMessage};

/// Dispatched command awaiting acknowledgement.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: CommandId,
    deadline: Instant,
    timeout_ms: u64,
}

/// Script progress. `completed` only grows.
#[derive(Debug, Default)]
struct Progress {
    has_script: bool,
    completed: usize,
    script_ids: HashSet<CommandId>,
}

impl Progress {
    fn total(&self) -> usize {
        self.completed + self.script_ids.len()
    }

    fn finish(&mut self, id: CommandId) {
        if self.script_ids.remove(&id) {
            self.completed += 1;
        }
    }

    /// Forget script commands that left the queue without running.
    fn sync(&mut self, queue: &CommandQueue) {
        let live: HashSet<CommandId> = queue
            .iter()
            .chain(queue.current())
            .map(|item| item.id)
            .collect();
        self.script_ids.retain(|id| live.contains(id));
    }
}

/// Protocol bridge between the command queue and one device.
///
/// All methods are driven from a single task (see [`run`](super::run)); the
/// bridge holds no locks.
pub struct ProtocolBridge<L> {
    link: L,
    config: BridgeConfig,
    queue: CommandQueue,
    state: DeviceState,
    in_flight: Option<InFlight>,
    serializer: CommandSerializer,
    compiler: Compiler,
    planner: Planner,
    events: broadcast::Sender<BridgeEvent>,
    progress: Progress,
    paused: bool,
}

impl<L: DeviceLink> ProtocolBridge<L> {
    /// Create a disconnected bridge.
    pub fn new(link: L, config: &SystemConfig) -> Self {
        let (events, _) = broadcast::channel(config.bridge.event_capacity.max(1));
        Self {
            link,
            config: config.bridge.clone(),
            queue: CommandQueue::new(config.queue),
            state: DeviceState::default(),
            in_flight: None,
            serializer: CommandSerializer::new(&config.bridge),
            compiler: Compiler::with_options(config.compiler),
            planner: Planner::new(config.planner),
            events,
            progress: Progress::default(),
            paused: false,
        }
    }

    /// Register an observer.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Device state.
    #[inline]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// The command queue.
    #[inline]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Bridge settings.
    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// True while a pause verb is in effect.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// When the in-flight command times out.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.in_flight.map(|f| f.deadline)
    }

    /// Current status summary.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            device_connected: self.state.is_connected(),
            has_script: self.progress.has_script,
            is_running: self.state.executing,
            current_command_index: self.progress.completed,
            total_commands: self.progress.total(),
            current_position: self.state.current_position,
        }
    }

    /// Compile, plan and enqueue a script at normal priority.
    ///
    /// # Errors
    ///
    /// Compile and planning errors; nothing is enqueued when either occurs.
    pub async fn load_script(&mut self, source: &str) -> crate::Result<Vec<CommandId>> {
        let compiled = self.compiler.compile(source)?;
        Planner::validate(&compiled.commands)?;
        let planned = self.planner.plan(&compiled.commands);

        let ids = self.queue.enqueue(planned, Priority::Normal);
        self.progress.has_script = true;
        self.progress.script_ids.extend(ids.iter().copied());
        info!(
            commands = ids.len(),
            functions = compiled.functions.len(),
            "script loaded"
        );

        self.publish_status();
        self.pump().await;
        Ok(ids)
    }

    /// Enqueue already-compiled commands.
    pub async fn enqueue(&mut self, commands: Vec<Command>, priority: Priority) -> Vec<CommandId> {
        let ids = self.queue.enqueue(commands, priority);
        self.publish_status();
        self.pump().await;
        ids
    }

    /// Apply an operator verb.
    ///
    /// Every verb except `stop` is queued at high priority; `stop` takes the
    /// emergency path.
    pub async fn control(&mut self, verb: ControlVerb) -> CommandId {
        let Some(command) = verb.to_command() else {
            return self.emergency_stop().await;
        };

        match verb {
            ControlVerb::Pause => self.paused = true,
            ControlVerb::Start | ControlVerb::Resume => self.paused = false,
            _ => {}
        }
        let id = self.queue.push(command, Priority::High);
        info!(%verb, %id, "control verb queued");

        self.publish_status();
        self.pump().await;
        id
    }

    /// Abandon the in-flight command, purge the queue and send `STOP`.
    ///
    /// When disconnected the `STOP` stays queued and goes out first on
    /// reconnect.
    pub async fn emergency_stop(&mut self) -> CommandId {
        if let Some(flight) = self.in_flight.take() {
            warn!(id = %flight.id, "abandoning in-flight command");
        }
        if let Some(item) = self.queue.abandon_current() {
            self.progress.finish(item.id);
        }
        self.state.executing = false;
        self.paused = false;

        let id = self.queue.insert_emergency_stop();
        self.progress.has_script = false;
        self.progress.sync(&self.queue);

        let sent = self.state.is_connected()
            && self.queue.take(id).is_some()
            && self.send_current().await;
        self.emit(BridgeEvent::EmergencyStop { id, sent });
        self.publish_status();

        self.pump().await;
        id
    }

    /// Fail the in-flight command as if the device had reported `reason`.
    pub async fn fail_current(&mut self, reason: impl Into<String>) -> Option<Resolution> {
        let flight = self.in_flight?;
        let cause = FailureCause::Device(DeviceError {
            message: reason.into(),
            code: None,
        });
        self.resolve(DispatchOutcome::Failed {
            id: flight.id,
            cause,
        })
        .await
    }

    /// Apply an inbound link event.
    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => self.set_connected().await,
            LinkEvent::Disconnected => self.set_disconnected(),
            LinkEvent::Message(message) => self.handle_device_message(message).await,
        }
    }

    /// Apply a device message.
    pub async fn handle_device_message(&mut self, message: DeviceMessage) {
        match message {
            DeviceMessage::Status { status, position } => {
                self.state.device_status = Some(status);
                if let Some(position) = position {
                    self.update_position(&position);
                }
                let Some(flight) = self.in_flight else {
                    return;
                };
                match status {
                    DeviceStatus::Idle => {
                        self.resolve(DispatchOutcome::Completed { id: flight.id })
                            .await;
                    }
                    DeviceStatus::Error => {
                        let cause = FailureCause::Device(DeviceError {
                            message: "device reported ERROR".into(),
                            code: None,
                        });
                        self.resolve(DispatchOutcome::Failed {
                            id: flight.id,
                            cause,
                        })
                        .await;
                    }
                    DeviceStatus::Busy | DeviceStatus::Homing | DeviceStatus::Unknown => {}
                }
            }
            DeviceMessage::Position { position } => self.update_position(&position),
            DeviceMessage::Error { message, code } => {
                warn!(%message, ?code, "device error");
                self.emit(BridgeEvent::DeviceError {
                    message: message.clone(),
                    code,
                });
                if let Some(flight) = self.in_flight {
                    let cause = FailureCause::Device(DeviceError { message, code });
                    self.resolve(DispatchOutcome::Failed {
                        id: flight.id,
                        cause,
                    })
                    .await;
                }
            }
            DeviceMessage::Heartbeat { .. } => {
                self.state.last_heartbeat = Some(Instant::now());
            }
        }
    }

    /// Fail the in-flight command if its deadline has passed.
    ///
    /// Returns whether the watchdog fired.
    pub async fn handle_timeout(&mut self) -> bool {
        let Some(flight) = self.in_flight else {
            return false;
        };
        if Instant::now() < flight.deadline {
            return false;
        }

        warn!(id = %flight.id, timeout_ms = flight.timeout_ms, "command timed out");
        let cause = FailureCause::Timeout(TimeoutError {
            command: flight.id.0,
            timeout_ms: flight.timeout_ms,
        });
        self.resolve(DispatchOutcome::Failed {
            id: flight.id,
            cause,
        })
        .await;
        true
    }

    /// Run the queue optimizer.
    pub fn optimize_queue(&mut self) -> OptimizeReport {
        let report = self.queue.optimize();
        if !report.is_noop() {
            self.progress.sync(&self.queue);
            self.publish_status();
        }
        report
    }

    async fn set_connected(&mut self) {
        if self.state.is_connected() {
            return;
        }
        info!(pending = self.queue.len(), "device link up");
        self.state.connection = ConnectionState::Connected;
        self.emit(BridgeEvent::Connection { connected: true });
        self.publish_status();
        self.pump().await;
    }

    fn set_disconnected(&mut self) {
        if let Some(id) = self.queue.requeue_current() {
            debug!(%id, "re-queued in-flight command");
        }
        self.in_flight = None;
        self.state.executing = false;

        if self.state.is_connected() {
            warn!(pending = self.queue.len(), "device link down");
            self.state.connection = ConnectionState::Disconnected;
            self.emit(BridgeEvent::Connection { connected: false });
            self.publish_status();
        }
    }

    fn update_position(&mut self, position: &AxisMap<i32>) {
        self.state.current_position.apply(position);
        self.emit(BridgeEvent::Position {
            position: self.state.current_position,
        });
    }

    /// Dispatch until something is in flight, the link drops, or nothing is
    /// eligible.
    async fn pump(&mut self) {
        while self.state.is_connected() && self.in_flight.is_none() {
            let Some(head) = self.queue.iter().next() else {
                break;
            };
            if self.paused && head.priority > Priority::High {
                debug!(pending = self.queue.len(), "paused, holding queue");
                break;
            }
            if self.queue.dequeue().is_none() {
                break;
            }
            self.send_current().await;
        }
    }

    /// Send the current queue item. Returns whether it reached the link.
    async fn send_current(&mut self) -> bool {
        let Some(item) = self.queue.current() else {
            return false;
        };
        let id = item.id;

        let encoded = self
            .serializer
            .serialize(item)
            .and_then(|serialized| OutboundMessage::execute(&serialized).map(|m| (serialized, m)));
        let (serialized, message) = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(%id, %err, "command cannot be sent, dropping");
                self.queue.abandon_current();
                self.progress.finish(id);
                self.emit(BridgeEvent::Failed {
                    id,
                    reason: err.to_string(),
                    terminal: true,
                });
                self.publish_status();
                return false;
            }
        };

        if let Err(err) = self.link.send(&message).await {
            warn!(%id, %err, "send failed, treating link as down");
            self.set_disconnected();
            return false;
        }

        info!(%id, cmd = %serialized.serial_cmd, timeout_ms = serialized.timeout, "dispatched");
        self.emit(BridgeEvent::Dispatched {
            id,
            action: serialized.action,
            timeout_ms: serialized.timeout,
        });

        if serialized.expect_response {
            self.in_flight = Some(InFlight {
                id,
                deadline: Instant::now() + Duration::from_millis(serialized.timeout),
                timeout_ms: serialized.timeout,
            });
            self.state.executing = true;
        } else {
            self.queue.mark_current_complete();
            self.progress.finish(id);
            self.emit(BridgeEvent::Completed { id });
        }
        self.publish_status();
        true
    }

    async fn resolve(&mut self, outcome: DispatchOutcome) -> Option<Resolution> {
        self.in_flight = None;
        self.state.executing = false;

        let reason = match &outcome {
            DispatchOutcome::Failed { cause, .. } => cause.to_string(),
            DispatchOutcome::Completed { .. } => String::new(),
        };
        let resolution = self.queue.resolve(&outcome);

        match &resolution {
            Some(Resolution::Completed(item)) => {
                self.progress.finish(item.id);
                self.emit(BridgeEvent::Completed { id: item.id });
            }
            Some(Resolution::Retrying {
                id,
                attempt,
                max_retries,
                ..
            }) => {
                self.emit(BridgeEvent::Failed {
                    id: *id,
                    reason,
                    terminal: false,
                });
                self.emit(BridgeEvent::Retrying {
                    id: *id,
                    attempt: *attempt,
                    max_retries: *max_retries,
                });
            }
            Some(Resolution::Dropped(item)) => {
                self.progress.finish(item.id);
                error!(id = %item.id, %reason, "command dropped");
                self.emit(BridgeEvent::Failed {
                    id: item.id,
                    reason: reason.clone(),
                    terminal: true,
                });
                if item.priority == Priority::Emergency {
                    self.force_stop(reason).await;
                }
            }
            None => {}
        }

        self.publish_status();
        self.pump().await;
        resolution
    }

    /// Last resort after an emergency command fails.
    async fn force_stop(&mut self, reason: String) {
        error!(%reason, "emergency command failed, forcing stop");
        self.queue.abandon_current();
        let cleared = self.queue.clear();
        self.progress.has_script = false;
        self.progress.sync(&self.queue);
        self.paused = false;

        if let Err(err) = self.link.send(&OutboundMessage::stop()).await {
            error!(%err, "could not send stop");
        }
        debug!(cleared, "queue cleared");
        self.emit(BridgeEvent::Fatal { reason });
    }

    fn publish_status(&mut self) {
        self.state.queue_length = self.queue.len();
        let snapshot = self.status();
        self.emit(BridgeEvent::Status(snapshot));
    }

    fn emit(&self, event: BridgeEvent) {
        // No observers is fine.
        let _ = self.events.send(event);
    }
}

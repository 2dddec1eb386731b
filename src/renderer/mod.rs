//! Renderer process runtime.
//!
//! Owns the [`DevToolsGate`] and executes the commands it returns: remote
//! checks and grace timers run as spawned tasks that report back on the one
//! event channel, and notices go out to whatever draws the password dialog.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::DevToolsApi;
use crate::bridge::{BridgeReceiver, FailureReason, HostMessage, RendererBridge};
use crate::devtools::{
    verify_with_backend, ChallengeId, DevToolsGate, DevToolsPolicy, DevToolsVerificationError,
    GateCommand, GateNotice, KeyDisposition, KeyEvent,
};
use crate::error::ApiError;

#[derive(Debug)]
pub enum RendererEvent {
    Key {
        event: KeyEvent,
        reply: Option<oneshot::Sender<KeyDisposition>>,
    },
    Submit(String),
    Cancel,
    RefreshStatus,
    StatusFetched(Result<bool, ApiError>),
    VerificationFinished {
        challenge: ChallengeId,
        result: Result<(), DevToolsVerificationError>,
    },
    GraceExpired(u64),
    Host(HostMessage),
    Inspect(oneshot::Sender<RendererSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct RendererSnapshot {
    pub state: &'static str,
    pub policy: DevToolsPolicy,
    pub challenge: Option<ChallengeId>,
    pub verifying: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RendererHandle {
    events_tx: mpsc::UnboundedSender<RendererEvent>,
    bridge: RendererBridge,
}

impl RendererHandle {
    /// Feed a key event and wait for the gate's decision.
    pub async fn key(&self, event: KeyEvent) -> KeyDisposition {
        let (tx, rx) = oneshot::channel();
        if self.events_tx.send(RendererEvent::Key { event, reply: Some(tx) }).is_err() {
            return KeyDisposition::PassThrough;
        }
        rx.await.unwrap_or(KeyDisposition::PassThrough)
    }

    pub fn submit(&self, password: impl Into<String>) {
        let _ = self.events_tx.send(RendererEvent::Submit(password.into()));
    }

    pub fn cancel(&self) {
        let _ = self.events_tx.send(RendererEvent::Cancel);
    }

    pub fn refresh_status(&self) {
        let _ = self.events_tx.send(RendererEvent::RefreshStatus);
    }

    pub fn shutdown(&self) {
        let _ = self.events_tx.send(RendererEvent::Shutdown);
    }

    pub async fn snapshot(&self) -> Option<RendererSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.events_tx.send(RendererEvent::Inspect(tx)).ok()?;
        rx.await.ok()
    }

    /// Window controls go straight to the host.
    pub fn window(&self) -> &RendererBridge {
        &self.bridge
    }
}

pub struct RendererRuntime {
    gate: DevToolsGate,
    api: Arc<dyn DevToolsApi>,
    bridge: RendererBridge,
    events_tx: mpsc::UnboundedSender<RendererEvent>,
    events_rx: mpsc::UnboundedReceiver<RendererEvent>,
    notices: mpsc::UnboundedSender<GateNotice>,
    grace_timer: Option<(u64, JoinHandle<()>)>,
}

impl RendererRuntime {
    /// Returns the runtime and the stream of notices for the UI.
    pub fn new(
        gate: DevToolsGate,
        api: Arc<dyn DevToolsApi>,
        bridge: RendererBridge,
    ) -> (Self, mpsc::UnboundedReceiver<GateNotice>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notices, notices_rx) = mpsc::unbounded_channel();
        let runtime = Self {
            gate,
            api,
            bridge,
            events_tx,
            events_rx,
            notices,
            grace_timer: None,
        };
        (runtime, notices_rx)
    }

    pub fn handle(&self) -> RendererHandle {
        RendererHandle {
            events_tx: self.events_tx.clone(),
            bridge: self.bridge.clone(),
        }
    }

    /// Fetch the password status, then process events until shutdown.
    pub async fn run(mut self, mut inbound: BridgeReceiver<HostMessage>) {
        let forward = self.events_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if forward.send(RendererEvent::Host(message)).is_err() {
                    break;
                }
            }
        });

        self.fetch_status();
        while let Some(event) = self.events_rx.recv().await {
            if !self.dispatch(event) {
                break;
            }
        }

        forwarder.abort();
        if let Some((_, timer)) = self.grace_timer.take() {
            timer.abort();
        }
        tracing::debug!("Renderer runtime stopped");
    }

    fn dispatch(&mut self, event: RendererEvent) -> bool {
        let commands = match event {
            RendererEvent::Key { event, reply } => {
                let (disposition, commands) = self.gate.handle_key(&event);
                if let Some(reply) = reply {
                    let _ = reply.send(disposition);
                }
                commands
            }
            RendererEvent::Submit(password) => self.gate.submit(&password),
            RendererEvent::Cancel => self.gate.cancel(),
            RendererEvent::RefreshStatus => {
                self.fetch_status();
                Vec::new()
            }
            RendererEvent::StatusFetched(Ok(has_password)) => self.gate.apply_status(has_password),
            RendererEvent::StatusFetched(Err(e)) => {
                tracing::warn!("Could not fetch devtools password status: {}", e);
                Vec::new()
            }
            RendererEvent::VerificationFinished { challenge, result } => {
                self.gate.verification_result(challenge, result)
            }
            RendererEvent::GraceExpired(window) => {
                if self.grace_timer.as_ref().is_some_and(|(id, _)| *id == window) {
                    self.grace_timer = None;
                }
                self.gate.grace_expired(window)
            }
            RendererEvent::Host(message) => self.on_host_message(message),
            RendererEvent::Inspect(reply) => {
                let challenge = self.gate.challenge();
                let _ = reply.send(RendererSnapshot {
                    state: self.gate.state().name(),
                    policy: self.gate.policy(),
                    challenge: challenge.map(|c| c.id),
                    verifying: challenge.is_some_and(|c| c.pending),
                    last_error: challenge.and_then(|c| c.last_error.clone()),
                });
                Vec::new()
            }
            RendererEvent::Shutdown => return false,
        };

        for command in commands {
            self.execute(command);
        }
        true
    }

    fn on_host_message(&mut self, message: HostMessage) -> Vec<GateCommand> {
        match message {
            HostMessage::RequestDevtoolsPassword { challenge } => {
                self.gate.host_challenge(challenge)
            }
            HostMessage::DevtoolsPasswordResult { challenge, success, reason, message } => {
                let result = match (success, reason) {
                    (true, _) => Ok(()),
                    (false, Some(FailureReason::WrongPassword)) => {
                        Err(DevToolsVerificationError::WrongPassword)
                    }
                    (false, _) => Err(DevToolsVerificationError::NetworkFailure(
                        message.unwrap_or_else(|| "host could not verify".to_string()),
                    )),
                };
                self.gate.verification_result(challenge, result)
            }
        }
    }

    fn execute(&mut self, command: GateCommand) {
        match command {
            GateCommand::VerifyRemote { challenge, password } => {
                let api = Arc::clone(&self.api);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = verify_with_backend(api.as_ref(), &password).await;
                    let _ = events.send(RendererEvent::VerificationFinished { challenge, result });
                });
            }
            GateCommand::RelayToHost { challenge, password } => {
                self.bridge.submit_devtools_password(challenge, password);
            }
            GateCommand::StartGraceTimer { window, duration } => {
                self.start_grace_timer(window, duration)
            }
            GateCommand::CancelGraceTimer { window } => {
                if let Some((id, timer)) = self.grace_timer.take() {
                    if id == window {
                        timer.abort();
                    } else {
                        self.grace_timer = Some((id, timer));
                    }
                }
            }
            GateCommand::Notify(notice) => {
                let _ = self.notices.send(notice);
            }
        }
    }

    fn start_grace_timer(&mut self, window: u64, duration: Duration) {
        if let Some((_, previous)) = self.grace_timer.take() {
            previous.abort();
        }
        let events = self.events_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(RendererEvent::GraceExpired(window));
        });
        self.grace_timer = Some((window, timer));
    }

    fn fetch_status(&self) {
        let api = Arc::clone(&self.api);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.password_status().await;
            let _ = events.send(RendererEvent::StatusFetched(result));
        });
    }
}

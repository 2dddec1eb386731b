//! Privileged-host side of the devtools guard.
//!
//! One task owns the window, the shortcut registrations and at most one
//! pending challenge. Everything reaches it as a [`HostEvent`] on a single
//! channel; slow work (backend verification, challenge timeouts) runs in
//! spawned tasks that report back on that same channel.

pub mod shortcuts;
pub mod window;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::api::DevToolsApi;
use crate::bridge::{BridgeReceiver, FailureReason, HostBridge, RendererMessage};
use crate::devtools::{verify_with_backend, ChallengeId, DevToolsVerificationError};

pub use shortcuts::{
    register_first, HeadlessRegistrar, ShortcutRegistrar, ShortcutRegistration,
    ShortcutRegistrationFailure,
};
pub use window::{HeadlessWindow, HostWindow, WindowState};

/// Decided once at startup and threaded through construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustMode {
    /// Toggle the debug surface directly
    Trusted,
    /// Require the renderer's password ceremony
    Distributed,
}

impl FromStr for TrustMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trusted" => Ok(TrustMode::Trusted),
            "distributed" => Ok(TrustMode::Distributed),
            other => Err(format!("unknown trust mode '{}'", other)),
        }
    }
}

impl fmt::Display for TrustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustMode::Trusted => f.write_str("trusted"),
            TrustMode::Distributed => f.write_str("distributed"),
        }
    }
}

#[derive(Debug)]
pub enum HostEvent {
    Shortcut(String),
    Bridge(RendererMessage),
    RelayVerified {
        challenge: ChallengeId,
        result: Result<(), DevToolsVerificationError>,
    },
    ChallengeExpired(ChallengeId),
    Inspect(oneshot::Sender<HostSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub trust_mode: TrustMode,
    pub pending_challenge: Option<ChallengeId>,
    pub registrations: Vec<ShortcutRegistration>,
    pub devtools_open: bool,
}

struct PendingChallenge {
    id: ChallengeId,
    timeout: JoinHandle<()>,
}

pub struct HostShortcutGuard {
    trust_mode: TrustMode,
    window: Box<dyn HostWindow>,
    registrar: Box<dyn ShortcutRegistrar>,
    verifier: Arc<dyn DevToolsApi>,
    bridge: HostBridge,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    registrations: Vec<ShortcutRegistration>,
    pending: Option<PendingChallenge>,
    challenge_timeout: Duration,
}

/// Cloneable handle used by the OS shortcut callbacks and the shell.
#[derive(Debug, Clone)]
pub struct HostHandle {
    events_tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostHandle {
    pub fn trigger_shortcut(&self, combo: impl Into<String>) {
        let _ = self.events_tx.send(HostEvent::Shortcut(combo.into()));
    }

    pub fn shutdown(&self) {
        let _ = self.events_tx.send(HostEvent::Shutdown);
    }

    pub async fn snapshot(&self) -> Option<HostSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.events_tx.send(HostEvent::Inspect(tx)).ok()?;
        rx.await.ok()
    }
}

impl HostShortcutGuard {
    pub fn new(
        trust_mode: TrustMode,
        window: Box<dyn HostWindow>,
        registrar: Box<dyn ShortcutRegistrar>,
        verifier: Arc<dyn DevToolsApi>,
        bridge: HostBridge,
        challenge_timeout: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            trust_mode,
            window,
            registrar,
            verifier,
            bridge,
            events_tx,
            events_rx,
            registrations: Vec::new(),
            pending: None,
            challenge_timeout,
        }
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle { events_tx: self.events_tx.clone() }
    }

    /// Register the first available global shortcut. Never fails startup.
    pub fn register_shortcuts(&mut self, candidates: &[String]) -> &[ShortcutRegistration] {
        self.registrations = register_first(self.registrar.as_mut(), candidates);
        &self.registrations
    }

    pub fn active_shortcut(&self) -> Option<&str> {
        self.registrations.iter().find(|r| r.registered).map(|r| r.combo.as_str())
    }

    /// Run the host loop until a [`HostEvent::Shutdown`] arrives. The guard
    /// keeps a sender of its own, so dropping every handle does not stop it.
    pub async fn run(mut self, mut inbound: BridgeReceiver<RendererMessage>) {
        tracing::info!("Host guard running in {} mode", self.trust_mode);

        let forward = self.events_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if forward.send(HostEvent::Bridge(message)).is_err() {
                    break;
                }
            }
        });

        while let Some(event) = self.events_rx.recv().await {
            if !self.dispatch(event) {
                break;
            }
        }

        forwarder.abort();
        if let Some(pending) = self.pending.take() {
            pending.timeout.abort();
        }
        self.registrar.unregister_all();
        tracing::info!("Host guard stopped, shortcuts unregistered");
    }

    /// Returns false when the loop should stop.
    fn dispatch(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::Shortcut(combo) => self.on_shortcut(&combo),
            HostEvent::Bridge(message) => self.on_renderer_message(message),
            HostEvent::RelayVerified { challenge, result } => {
                self.on_relay_verified(challenge, result)
            }
            HostEvent::ChallengeExpired(challenge) => self.on_challenge_expired(challenge),
            HostEvent::Inspect(reply) => {
                let _ = reply.send(HostSnapshot {
                    trust_mode: self.trust_mode,
                    pending_challenge: self.pending.as_ref().map(|p| p.id),
                    registrations: self.registrations.clone(),
                    devtools_open: self.window.is_devtools_open(),
                });
            }
            HostEvent::Shutdown => return false,
        }
        true
    }

    /// The one place trust mode is consulted.
    fn on_shortcut(&mut self, combo: &str) {
        tracing::info!("Shortcut {} triggered", combo);

        if self.window.is_devtools_open() {
            self.window.close_devtools();
            return;
        }

        match self.trust_mode {
            TrustMode::Trusted => self.window.open_devtools(),
            TrustMode::Distributed => self.issue_challenge(),
        }
    }

    fn issue_challenge(&mut self) {
        if let Some(previous) = self.pending.take() {
            tracing::debug!("Superseding pending challenge {}", previous.id);
            previous.timeout.abort();
        }

        let id = ChallengeId::new();
        let events = self.events_tx.clone();
        let wait = self.challenge_timeout;
        let timeout = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = events.send(HostEvent::ChallengeExpired(id));
        });

        self.pending = Some(PendingChallenge { id, timeout });
        tracing::info!("Requesting devtools password from renderer (challenge {})", id);
        self.bridge.request_devtools_password(id);
    }

    fn on_renderer_message(&mut self, message: RendererMessage) {
        match message {
            RendererMessage::WindowMinimize => self.window.minimize(),
            RendererMessage::WindowMaximize => {
                if self.window.is_maximized() {
                    self.window.unmaximize();
                } else {
                    self.window.maximize();
                }
            }
            RendererMessage::WindowClose => self.window.close(),
            RendererMessage::VerifyDevtoolsPassword { challenge, password } => {
                if !self.is_pending(challenge) {
                    tracing::warn!(
                        "Password submitted for unknown or expired challenge {}",
                        challenge
                    );
                    self.bridge.send_verification_failure(
                        challenge,
                        FailureReason::Expired,
                        "this request has expired, press the shortcut again".to_string(),
                    );
                    return;
                }

                // relayed to the backend; the host never compares passwords
                let verifier = Arc::clone(&self.verifier);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = verify_with_backend(verifier.as_ref(), &password).await;
                    let _ = events.send(HostEvent::RelayVerified { challenge, result });
                });
            }
        }
    }

    fn on_relay_verified(
        &mut self,
        challenge: ChallengeId,
        result: Result<(), DevToolsVerificationError>,
    ) {
        if !self.is_pending(challenge) {
            tracing::debug!("Verification for {} arrived after the challenge ended", challenge);
            self.bridge.send_verification_failure(
                challenge,
                FailureReason::Expired,
                "this request has expired".to_string(),
            );
            return;
        }

        match result {
            Ok(()) => {
                if let Some(pending) = self.pending.take() {
                    pending.timeout.abort();
                }
                self.window.open_devtools();
                self.bridge.send_verification_success(challenge);
            }
            Err(e) => {
                // keep waiting: the renderer may retry on the same challenge
                tracing::warn!("Relayed devtools verification failed: {}", e);
                self.bridge.send_verification_failure(
                    challenge,
                    FailureReason::from(&e),
                    e.to_string(),
                );
            }
        }
    }

    fn on_challenge_expired(&mut self, challenge: ChallengeId) {
        if self.is_pending(challenge) {
            tracing::info!("Challenge {} timed out, devtools left closed", challenge);
            self.pending = None;
        }
    }

    fn is_pending(&self, challenge: ChallengeId) -> bool {
        self.pending.as_ref().is_some_and(|p| p.id == challenge)
    }
}

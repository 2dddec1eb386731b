//! Renderer-side devtools gate.
//!
//! The gate is a plain state machine: every input is a method call that
//! returns the [`GateCommand`]s the runtime must carry out (remote checks,
//! timers, notices). It owns `password_configured` and `protection_active`
//! through its state and nothing else mutates them.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::keys::{KeyEvent, TriggerCombo};
use super::{validate_input, ChallengeId, DevToolsVerificationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChallengeOrigin {
    /// Intercepted key in the renderer; verified against the backend directly
    Renderer(TriggerCombo),
    /// Global shortcut on the host; the password is relayed to the host
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordChallenge {
    pub id: ChallengeId,
    pub origin: ChallengeOrigin,
    /// A remote check is in flight
    pub pending: bool,
    pub last_error: Option<String>,
}

impl PasswordChallenge {
    fn new(id: ChallengeId, origin: ChallengeOrigin) -> Self {
        Self { id, origin, pending: false, last_error: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraceWindow {
    pub id: u64,
    #[serde(skip)]
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GateState {
    /// No password configured; nothing is intercepted
    Disabled,
    Armed,
    Challenging(PasswordChallenge),
    Suspended(GraceWindow),
}

impl GateState {
    pub fn name(&self) -> &'static str {
        match self {
            GateState::Disabled => "disabled",
            GateState::Armed => "armed",
            GateState::Challenging(_) => "challenging",
            GateState::Suspended(_) => "suspended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DevToolsPolicy {
    pub password_configured: bool,
    pub protection_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Default handling proceeds
    PassThrough,
    /// Default action prevented
    Intercepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateCommand {
    VerifyRemote { challenge: ChallengeId, password: String },
    RelayToHost { challenge: ChallengeId, password: String },
    StartGraceTimer { window: u64, duration: Duration },
    CancelGraceTimer { window: u64 },
    Notify(GateNotice),
}

/// User-facing messages for whatever renders the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GateNotice {
    ProtectionEnabled,
    ProtectionDisabled,
    ChallengeOpened { challenge: ChallengeId, origin: ChallengeOrigin },
    ChallengeClosed { challenge: ChallengeId },
    InputRejected(String),
    Verifying,
    VerificationFailed(String),
    Unlocked { rearm_after: Duration },
    Rearmed,
}

#[derive(Debug)]
pub struct DevToolsGate {
    state: GateState,
    grace_duration: Duration,
    min_password_len: usize,
    next_window: u64,
}

impl DevToolsGate {
    pub fn new(grace_duration: Duration, min_password_len: usize) -> Self {
        Self {
            state: GateState::Disabled,
            grace_duration,
            min_password_len,
            next_window: 0,
        }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(config.grace_window(), config.devtools.min_password_len)
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn policy(&self) -> DevToolsPolicy {
        DevToolsPolicy {
            password_configured: !matches!(self.state, GateState::Disabled),
            protection_active: matches!(self.state, GateState::Armed | GateState::Challenging(_)),
        }
    }

    pub fn challenge(&self) -> Option<&PasswordChallenge> {
        match &self.state {
            GateState::Challenging(challenge) => Some(challenge),
            _ => None,
        }
    }

    /// Apply a `hasPassword` observation from the status endpoint.
    pub fn apply_status(&mut self, has_password: bool) -> Vec<GateCommand> {
        let mut commands = Vec::new();

        let disabled = matches!(self.state, GateState::Disabled);
        if has_password && disabled {
            self.state = GateState::Armed;
            tracing::info!("Devtools protection enabled");
            commands.push(GateCommand::Notify(GateNotice::ProtectionEnabled));
        } else if !has_password && !disabled {
            self.leave_current_state(&mut commands);
            self.state = GateState::Disabled;
            tracing::info!("Devtools password removed, protection disabled");
            commands.push(GateCommand::Notify(GateNotice::ProtectionDisabled));
        }

        commands
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> (KeyDisposition, Vec<GateCommand>) {
        let Some(combo) = TriggerCombo::detect(event) else {
            return (KeyDisposition::PassThrough, Vec::new());
        };

        match &self.state {
            GateState::Disabled | GateState::Suspended(_) => {
                (KeyDisposition::PassThrough, Vec::new())
            }
            GateState::Challenging(_) => {
                tracing::debug!("{} pressed with a challenge already open", combo);
                (KeyDisposition::Intercepted, Vec::new())
            }
            GateState::Armed => {
                tracing::info!("Intercepted {}, requesting devtools password", combo);
                let commands =
                    self.open_challenge(ChallengeId::new(), ChallengeOrigin::Renderer(combo));
                (KeyDisposition::Intercepted, commands)
            }
        }
    }

    /// The host asked for the ceremony after a global shortcut.
    pub fn host_challenge(&mut self, challenge: ChallengeId) -> Vec<GateCommand> {
        if matches!(self.state, GateState::Disabled) {
            tracing::warn!("Host requested a devtools password but none is configured; ignoring");
            return Vec::new();
        }

        let mut commands = Vec::new();
        self.leave_current_state(&mut commands);
        commands.extend(self.open_challenge(challenge, ChallengeOrigin::Host));
        commands
    }

    pub fn submit(&mut self, value: &str) -> Vec<GateCommand> {
        let min_len = self.min_password_len;
        let GateState::Challenging(challenge) = &mut self.state else {
            tracing::debug!("Password submitted with no open challenge");
            return Vec::new();
        };

        if challenge.pending {
            return vec![GateCommand::Notify(GateNotice::Verifying)];
        }

        if let Err(e) = validate_input(value, min_len) {
            challenge.last_error = Some(e.to_string());
            return vec![GateCommand::Notify(GateNotice::InputRejected(e.to_string()))];
        }

        challenge.pending = true;
        challenge.last_error = None;
        let password = value.to_string();
        let verify = match challenge.origin {
            ChallengeOrigin::Renderer(_) => {
                GateCommand::VerifyRemote { challenge: challenge.id, password }
            }
            ChallengeOrigin::Host => GateCommand::RelayToHost { challenge: challenge.id, password },
        };
        vec![verify, GateCommand::Notify(GateNotice::Verifying)]
    }

    pub fn cancel(&mut self) -> Vec<GateCommand> {
        let GateState::Challenging(challenge) = &self.state else {
            return Vec::new();
        };
        let id = challenge.id;
        self.state = GateState::Armed;
        tracing::debug!("Challenge {} cancelled", id);
        vec![GateCommand::Notify(GateNotice::ChallengeClosed { challenge: id })]
    }

    /// Outcome of a remote check. Ignored unless it answers the open challenge.
    pub fn verification_result(
        &mut self,
        challenge: ChallengeId,
        result: Result<(), DevToolsVerificationError>,
    ) -> Vec<GateCommand> {
        let current = match &mut self.state {
            GateState::Challenging(c) if c.id == challenge => c,
            _ => {
                tracing::debug!("Discarding stale verification result for {}", challenge);
                return Vec::new();
            }
        };

        match result {
            Ok(()) => {
                self.next_window += 1;
                let window = GraceWindow {
                    id: self.next_window,
                    expires_at: Instant::now() + self.grace_duration,
                };
                self.state = GateState::Suspended(window);
                tracing::info!(
                    "Devtools password accepted, protection suspended for {:?}",
                    self.grace_duration
                );
                vec![
                    GateCommand::Notify(GateNotice::ChallengeClosed { challenge }),
                    GateCommand::StartGraceTimer {
                        window: window.id,
                        duration: self.grace_duration,
                    },
                    GateCommand::Notify(GateNotice::Unlocked { rearm_after: self.grace_duration }),
                ]
            }
            Err(e) => {
                let message = match &e {
                    DevToolsVerificationError::WrongPassword => "wrong password, please retry",
                    DevToolsVerificationError::NetworkFailure(_) => {
                        "verification failed, please retry"
                    }
                }
                .to_string();
                tracing::warn!("Devtools password rejected: {}", e);
                current.pending = false;
                current.last_error = Some(message.clone());
                vec![GateCommand::Notify(GateNotice::VerificationFailed(message))]
            }
        }
    }

    pub fn grace_expired(&mut self, window: u64) -> Vec<GateCommand> {
        match &self.state {
            GateState::Suspended(active) if active.id == window => {
                self.state = GateState::Armed;
                tracing::info!("Grace window elapsed, devtools protection re-armed");
                vec![GateCommand::Notify(GateNotice::Rearmed)]
            }
            _ => {
                tracing::debug!("Ignoring expiry of superseded grace window {}", window);
                Vec::new()
            }
        }
    }

    fn open_challenge(&mut self, id: ChallengeId, origin: ChallengeOrigin) -> Vec<GateCommand> {
        self.state = GateState::Challenging(PasswordChallenge::new(id, origin));
        vec![GateCommand::Notify(GateNotice::ChallengeOpened { challenge: id, origin })]
    }

    fn leave_current_state(&mut self, commands: &mut Vec<GateCommand>) {
        match &self.state {
            GateState::Suspended(window) => {
                commands.push(GateCommand::CancelGraceTimer { window: window.id });
            }
            GateState::Challenging(challenge) => {
                commands.push(GateCommand::Notify(GateNotice::ChallengeClosed {
                    challenge: challenge.id,
                }));
            }
            GateState::Disabled | GateState::Armed => {}
        }
    }
}

//! Guard bridge between the sandboxed renderer and the privileged host.
//!
//! The contract is closed: [`RendererMessage`] and [`HostMessage`] are the
//! only things that cross, each on a named channel. Frames travel as JSON
//! text so the two sides never share memory; anything that does not decode
//! into a known message is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::devtools::{ChallengeId, DevToolsVerificationError};

/// Capabilities the renderer may invoke on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum RendererMessage {
    WindowMinimize,
    WindowMaximize,
    WindowClose,
    VerifyDevtoolsPassword { challenge: ChallengeId, password: String },
}

/// Notifications the host may push to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum HostMessage {
    RequestDevtoolsPassword {
        challenge: ChallengeId,
    },
    DevtoolsPasswordResult {
        challenge: ChallengeId,
        success: bool,
        /// Why a failed check failed; absent on success
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<FailureReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    WrongPassword,
    /// The backend could not give a verdict
    Unavailable,
    /// The challenge is no longer pending on the host
    Expired,
}

impl From<&DevToolsVerificationError> for FailureReason {
    fn from(err: &DevToolsVerificationError) -> Self {
        match err {
            DevToolsVerificationError::WrongPassword => FailureReason::WrongPassword,
            DevToolsVerificationError::NetworkFailure(_) => FailureReason::Unavailable,
        }
    }
}

impl RendererMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            RendererMessage::WindowMinimize => "window-minimize",
            RendererMessage::WindowMaximize => "window-maximize",
            RendererMessage::WindowClose => "window-close",
            RendererMessage::VerifyDevtoolsPassword { .. } => "verify-devtools-password",
        }
    }
}

impl HostMessage {
    pub fn channel(&self) -> &'static str {
        match self {
            HostMessage::RequestDevtoolsPassword { .. } => "request-devtools-password",
            HostMessage::DevtoolsPasswordResult { .. } => "devtools-password-result",
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!("Failed to encode bridge frame: {}", e);
            None
        }
    }
}

pub fn decode<T: for<'de> Deserialize<'de>>(frame: &str) -> Option<T> {
    match serde_json::from_str(frame) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("Dropping malformed bridge frame: {}", e);
            None
        }
    }
}

/// Inbound half of either end. Malformed frames are skipped.
#[derive(Debug)]
pub struct BridgeReceiver<T> {
    inbound: mpsc::UnboundedReceiver<String>,
    _message: std::marker::PhantomData<fn() -> T>,
}

impl<T: for<'de> Deserialize<'de>> BridgeReceiver<T> {
    fn new(inbound: mpsc::UnboundedReceiver<String>) -> Self {
        Self { inbound, _message: std::marker::PhantomData }
    }

    /// Next well-formed message; `None` once the other end is gone.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let frame = self.inbound.recv().await?;
            if let Some(message) = decode(&frame) {
                return Some(message);
            }
        }
    }
}

/// Renderer end: may only use the four renderer capabilities.
#[derive(Debug, Clone)]
pub struct RendererBridge {
    outbound: mpsc::UnboundedSender<String>,
}

/// Host end: may only push the two host notifications.
#[derive(Debug, Clone)]
pub struct HostBridge {
    outbound: mpsc::UnboundedSender<String>,
}

/// Connected pair of bridge ends, each with its inbound half.
pub fn pair() -> (
    (RendererBridge, BridgeReceiver<HostMessage>),
    (HostBridge, BridgeReceiver<RendererMessage>),
) {
    let (to_host, from_renderer) = mpsc::unbounded_channel();
    let (to_renderer, from_host) = mpsc::unbounded_channel();
    (
        (RendererBridge { outbound: to_host }, BridgeReceiver::new(from_host)),
        (HostBridge { outbound: to_renderer }, BridgeReceiver::new(from_renderer)),
    )
}

fn send_frame<T: Serialize>(tx: &mpsc::UnboundedSender<String>, message: &T, channel: &str) {
    let Some(frame) = encode(message) else { return };
    if tx.send(frame).is_err() {
        tracing::warn!("Bridge closed, dropped {} message", channel);
    }
}

impl RendererBridge {
    pub fn minimize_window(&self) {
        self.send(&RendererMessage::WindowMinimize);
    }

    pub fn maximize_window(&self) {
        self.send(&RendererMessage::WindowMaximize);
    }

    pub fn close_window(&self) {
        self.send(&RendererMessage::WindowClose);
    }

    pub fn submit_devtools_password(&self, challenge: ChallengeId, password: String) {
        self.send(&RendererMessage::VerifyDevtoolsPassword { challenge, password });
    }

    fn send(&self, message: &RendererMessage) {
        send_frame(&self.outbound, message, message.channel());
    }
}

impl HostBridge {
    pub fn request_devtools_password(&self, challenge: ChallengeId) {
        self.send(&HostMessage::RequestDevtoolsPassword { challenge });
    }

    pub fn send_verification_success(&self, challenge: ChallengeId) {
        self.send(&HostMessage::DevtoolsPasswordResult {
            challenge,
            success: true,
            reason: None,
            message: None,
        });
    }

    pub fn send_verification_failure(
        &self,
        challenge: ChallengeId,
        reason: FailureReason,
        message: String,
    ) {
        self.send(&HostMessage::DevtoolsPasswordResult {
            challenge,
            success: false,
            reason: Some(reason),
            message: Some(message),
        });
    }

    fn send(&self, message: &HostMessage) {
        send_frame(&self.outbound, message, message.channel());
    }

    /// Raw frame injection, for exercising malformed input.
    #[cfg(test)]
    pub(crate) fn raw_sender(&self) -> mpsc::UnboundedSender<String> {
        self.outbound.clone()
    }
}

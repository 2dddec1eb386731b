use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not register global shortcut {combo}: {reason}")]
pub struct ShortcutRegistrationFailure {
    pub combo: String,
    pub reason: String,
}

/// OS-level global shortcut registration.
pub trait ShortcutRegistrar: Send {
    fn register(&mut self, combo: &str) -> Result<(), ShortcutRegistrationFailure>;
    fn unregister_all(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutRegistration {
    pub combo: String,
    pub registered: bool,
}

/// Try each candidate in priority order and keep the first that registers.
/// Failures are logged and never propagate.
pub fn register_first(
    registrar: &mut dyn ShortcutRegistrar,
    candidates: &[String],
) -> Vec<ShortcutRegistration> {
    let mut registrations: Vec<ShortcutRegistration> = candidates
        .iter()
        .map(|combo| ShortcutRegistration { combo: combo.clone(), registered: false })
        .collect();

    for registration in registrations.iter_mut() {
        match registrar.register(&registration.combo) {
            Ok(()) => {
                registration.registered = true;
                tracing::info!("Registered devtools shortcut {}", registration.combo);
                return registrations;
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    tracing::error!("No devtools shortcut could be registered; the host toggle is unavailable");
    registrations
}

/// Registrar with no OS behind it; refuses a configurable set of combos.
#[derive(Debug, Default)]
pub struct HeadlessRegistrar {
    refused: HashSet<String>,
    registered: Vec<String>,
}

impl HeadlessRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing<I, S>(combos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            refused: combos.into_iter().map(Into::into).collect(),
            registered: Vec::new(),
        }
    }

    pub fn registered(&self) -> &[String] {
        &self.registered
    }
}

impl ShortcutRegistrar for HeadlessRegistrar {
    fn register(&mut self, combo: &str) -> Result<(), ShortcutRegistrationFailure> {
        if self.refused.contains(combo) {
            return Err(ShortcutRegistrationFailure {
                combo: combo.to_string(),
                reason: "already claimed by another application".to_string(),
            });
        }
        self.registered.push(combo.to_string());
        Ok(())
    }

    fn unregister_all(&mut self) {
        self.registered.clear();
    }
}

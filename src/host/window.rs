use std::sync::{Arc, Mutex};

use serde::Serialize;

/// The privileged window the host controls. Implemented by the desktop shell.
pub trait HostWindow: Send {
    fn minimize(&mut self);
    fn is_maximized(&self) -> bool;
    fn maximize(&mut self);
    fn unmaximize(&mut self);
    fn close(&mut self);

    fn is_devtools_open(&self) -> bool;
    fn open_devtools(&mut self);
    fn close_devtools(&mut self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WindowState {
    pub minimized: bool,
    pub maximized: bool,
    pub closed: bool,
    pub devtools_open: bool,
}

/// Window without a display; records state so it can be observed from
/// outside the host loop.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindow {
    state: Arc<Mutex<WindowState>>,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WindowState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut WindowState) -> R) -> R {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl HostWindow for HeadlessWindow {
    fn minimize(&mut self) {
        self.with_state(|s| s.minimized = true);
        tracing::info!("Window minimized");
    }

    fn is_maximized(&self) -> bool {
        self.with_state(|s| s.maximized)
    }

    fn maximize(&mut self) {
        self.with_state(|s| {
            s.maximized = true;
            s.minimized = false;
        });
        tracing::info!("Window maximized");
    }

    fn unmaximize(&mut self) {
        self.with_state(|s| s.maximized = false);
        tracing::info!("Window restored");
    }

    fn close(&mut self) {
        self.with_state(|s| s.closed = true);
        tracing::info!("Window closed");
    }

    fn is_devtools_open(&self) -> bool {
        self.with_state(|s| s.devtools_open)
    }

    fn open_devtools(&mut self) {
        self.with_state(|s| s.devtools_open = true);
        tracing::info!("Devtools opened");
    }

    fn close_devtools(&mut self) {
        self.with_state(|s| s.devtools_open = false);
        tracing::info!("Devtools closed");
    }
}

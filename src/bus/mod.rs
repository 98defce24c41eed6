//! In-process event bus shared by the main window, the floating window and
//! the tray icon.
//!
//! Messages are JSON values published on named channels. The application
//! only depends on the [`EventBus`] trait; [`LocalEventBus`] is the
//! in-process implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;

/// Channel names.
pub mod channels {
    // Outbound
    pub const TIMER_STATE_SYNC: &str = "timer-state-sync";
    pub const FLOAT_SIZE_SYNC: &str = "float-size-sync";
    pub const FLOAT_DISPLAY_SETTINGS_SYNC: &str = "float-display-settings-sync";
    pub const TRAY_ICON_STATE: &str = "tray-icon-state";
    pub const OPEN_SETTINGS: &str = "open-settings";
    pub const CLOSE_REQUESTED: &str = "close-requested";
    pub const SESSION_PENDING: &str = "session-pending";

    // Inbound from the tray
    pub const TRAY_START: &str = "tray-start";
    pub const TRAY_PAUSE: &str = "tray-pause";
    pub const TRAY_RESET: &str = "tray-reset";
    pub const TRAY_SETTINGS: &str = "tray-settings";
    pub const TRAY_QUIT: &str = "tray-quit";
    pub const TRAY_SHOW: &str = "tray-show";

    // Inbound from the floating window
    pub const FLOAT_START: &str = "float-start";
    pub const FLOAT_PAUSE: &str = "float-pause";
    pub const FLOAT_STOP: &str = "float-stop";
    pub const FLOAT_SHOW_MAIN: &str = "float-show-main";
}

// ============================================================================
// BusError
// ============================================================================

#[derive(Debug, Error)]
pub enum BusError {
    /// The bus has been shut down
    #[error("イベントバスは閉じられています")]
    Closed,

    /// A payload could not be serialized
    #[error("ペイロードのシリアライズに失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("イベントバスのロックに失敗しました")]
    LockPoisoned,
}

impl BusError {
    pub fn is_closed(&self) -> bool {
        matches!(self, BusError::Closed)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Callback invoked with each payload published on a channel.
pub type Handler = Arc<dyn Fn(Value) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Named-channel publish/subscribe.
pub trait EventBus: Send + Sync {
    /// Publishes `payload` to every listener of `channel`.
    fn emit(&self, channel: &str, payload: Value) -> Result<(), BusError>;

    fn listen(&self, channel: &str, handler: Handler) -> Result<ListenerId, BusError>;

    /// Removes a listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId) -> Result<(), BusError>;
}

/// Serializes `payload` and publishes it.
pub fn emit_json<T: serde::Serialize>(
    bus: &dyn EventBus,
    channel: &str,
    payload: &T,
) -> Result<(), BusError> {
    bus.emit(channel, serde_json::to_value(payload)?)
}

// ============================================================================
// LocalEventBus
// ============================================================================

struct Registration {
    channel: String,
    handler: Handler,
}

/// Event bus delivering messages synchronously on the emitting thread.
///
/// Handlers are cloned out of the registry before they run, so a handler may
/// itself emit, listen or unlisten.
#[derive(Default)]
pub struct LocalEventBus {
    listeners: Mutex<HashMap<ListenerId, Registration>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Drops every listener and rejects further use.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.clear();
        }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEventBus")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl EventBus for LocalEventBus {
    fn emit(&self, channel: &str, payload: Value) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut handlers: Vec<(ListenerId, Handler)> = {
            let listeners = self.listeners.lock().map_err(|_| BusError::LockPoisoned)?;
            listeners
                .iter()
                .filter(|(_, reg)| reg.channel == channel)
                .map(|(id, reg)| (*id, Arc::clone(&reg.handler)))
                .collect()
        };
        handlers.sort_by_key(|(id, _)| id.0);

        tracing::trace!(channel, listeners = handlers.len(), "イベント送信");
        for (_, handler) in handlers {
            handler(payload.clone());
        }
        Ok(())
    }

    fn listen(&self, channel: &str, handler: Handler) -> Result<ListenerId, BusError> {
        self.ensure_open()?;
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .map_err(|_| BusError::LockPoisoned)?
            .insert(
                id,
                Registration {
                    channel: channel.to_string(),
                    handler,
                },
            );
        Ok(id)
    }

    fn unlisten(&self, id: ListenerId) -> Result<(), BusError> {
        self.listeners
            .lock()
            .map_err(|_| BusError::LockPoisoned)?
            .remove(&id);
        Ok(())
    }
}

// ============================================================================
// MessageLog
// ============================================================================

/// Collects every payload published on one channel.
///
/// Intended for tests and diagnostics.
#[derive(Debug)]
pub struct MessageLog {
    channel: String,
    messages: Arc<Mutex<Vec<Value>>>,
}

impl MessageLog {
    pub fn attach(bus: &dyn EventBus, channel: &str) -> Result<Self, BusError> {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        bus.listen(
            channel,
            Arc::new(move |payload| {
                if let Ok(mut messages) = sink.lock() {
                    messages.push(payload);
                }
            }),
        )?;
        Ok(Self {
            channel: channel.to_string(),
            messages,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn messages(&self) -> Vec<Value> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<Value> {
        self.messages
            .lock()
            .ok()
            .and_then(|m| m.last().cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

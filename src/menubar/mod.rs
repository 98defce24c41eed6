//! Tray icon for the reminder.
//!
//! This module provides:
//! - Tray icon management (native on macOS, no-op elsewhere)
//! - Title text with the running clock (e.g., "🍅 15:30")
//! - A menu with start/pause/reset/settings/quit whose enabled items follow
//!   the tray state
//! - A bridge from the event bus to the tray
//!
//! # Architecture
//!
//! - `icon.rs`: Title text generation (platform-independent, fully testable)
//! - `menu.rs`: Menu configuration (platform-independent, fully testable)
//! - `event.rs`: Event types and handling (platform-independent, fully testable)
//! - `mod.rs`: TrayIconManager (platform-specific on macOS) and TrayBridge
//!
//! The broadcaster publishes `tray-icon-state` on the bus. [`TrayBridge`]
//! turns bus messages into [`TrayUpdate`]s on a crossbeam channel, and the
//! [`TrayIconManager`] applies them on the thread that owns the native icon.
//! Menu clicks travel the other way: the manager publishes the matching
//! `tray-*` channel and the command listener picks it up.
//!
//! ```ignore
//! use pomodoro_reminder::menubar::{TrayBridge, TrayIconManager};
//! use crossbeam_channel::unbounded;
//!
//! let (tx, rx) = unbounded();
//! let _bridge = TrayBridge::attach(bus.clone(), tx)?;
//! let mut manager = TrayIconManager::new(rx, bus);
//! manager.initialize()?;
//!
//! // On the owning thread, periodically:
//! manager.pump();
//! ```

pub mod event;
pub mod icon;
pub mod menu;

pub use event::{EventHandler, MenuAction, MenuItemId, TrayUpdate};
pub use icon::{format_clock, IconManager, TrayView};
pub use menu::{MenuBuilder, MenuConfig, MenuItemConfig};

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;

use crate::bus::{channels, BusError, EventBus, ListenerId};
use crate::types::TrayIconState;

// ============================================================================
// TrayIconManager
// ============================================================================

/// Manages the tray icon and its menu.
///
/// On macOS, it also manages the actual tray-icon instance.
/// On other platforms, it operates in a no-op mode.
pub struct TrayIconManager {
    icon_manager: IconManager,
    menu_builder: MenuBuilder,
    event_handler: EventHandler,
    view: TrayView,
    /// Channel for receiving updates from the application loop
    update_rx: Receiver<TrayUpdate>,
    /// Bus that menu actions are published on
    bus: Arc<dyn EventBus>,
    initialized: bool,
    #[cfg(target_os = "macos")]
    native: Option<native::NativeTray>,
}

impl TrayIconManager {
    /// Creates a new TrayIconManager.
    ///
    /// On macOS, the actual tray icon is not created until `initialize()` is
    /// called.
    pub fn new(update_rx: Receiver<TrayUpdate>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            icon_manager: IconManager::new(),
            menu_builder: MenuBuilder::new(),
            event_handler: EventHandler::new(),
            view: TrayView::default(),
            update_rx,
            bus,
            initialized: false,
            #[cfg(target_os = "macos")]
            native: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn view(&self) -> TrayView {
        self.view
    }

    /// Generates the current title for the tray.
    pub fn generate_title(&self) -> String {
        self.icon_manager.generate_title(&self.view)
    }

    /// Generates the current menu configuration.
    pub fn generate_menu_config(&self) -> MenuConfig {
        self.menu_builder.build(&self.view)
    }

    /// Applies every pending update and forwards native tray events.
    ///
    /// Returns the number of updates applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while self.process_pending_update() {
            applied += 1;
        }
        #[cfg(target_os = "macos")]
        self.poll_native_events();
        applied
    }

    /// Processes one pending update from the channel.
    ///
    /// Returns `true` if an update was processed, `false` if the channel was empty.
    pub fn process_pending_update(&mut self) -> bool {
        match self.update_rx.try_recv() {
            Ok(update) => {
                self.handle_update(update);
                true
            }
            Err(crossbeam_channel::TryRecvError::Empty) => false,
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                tracing::warn!("トレイ更新チャネルが切断されました");
                false
            }
        }
    }

    /// Publishes a menu action on the bus.
    pub fn dispatch(&self, action: MenuAction) {
        if let Err(e) = self.bus.emit(action.channel(), Value::Null) {
            tracing::error!(action = %action, error = %e, "アクション実行失敗");
        }
    }

    /// Handles a click on a menu item.
    pub fn handle_menu_click(&self, item_id: MenuItemId) {
        if let Some(action) = self.event_handler.handle_click(item_id) {
            self.dispatch(action);
        }
    }

    /// Handles a left click on the icon.
    pub fn handle_icon_click(&self) {
        self.dispatch(self.event_handler.handle_icon_click());
    }

    fn handle_update(&mut self, update: TrayUpdate) {
        match update {
            TrayUpdate::SetState(state) => {
                self.view.state = state;
                if state == TrayIconState::Idle {
                    self.view.clock_ms = None;
                }
                let rebuild = self.icon_manager.state_changed(state);
                tracing::debug!(state = state.as_str(), rebuild, "トレイ状態更新");
                self.refresh(rebuild);
            }
            TrayUpdate::SetClock(ms) => {
                self.view.clock_ms = Some(ms);
                self.refresh(false);
            }
            TrayUpdate::Shutdown => {
                tracing::info!("トレイアイコンをシャットダウン");
                self.shutdown();
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn refresh(&mut self, rebuild_menu: bool) {
        let title = self.generate_title();
        let tooltip = self.icon_manager.tooltip(&self.view);
        let config = rebuild_menu.then(|| self.generate_menu_config());
        if let Some(native) = self.native.as_ref() {
            native.apply(&title, tooltip, config.as_ref());
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn refresh(&mut self, _rebuild_menu: bool) {}

    /// Shuts down the tray icon.
    pub fn shutdown(&mut self) {
        self.initialized = false;
        #[cfg(target_os = "macos")]
        {
            self.native = None;
        }
    }

    /// Initializes the tray icon (macOS only).
    ///
    /// This must be called from the thread that runs the event loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the tray icon cannot be created.
    #[cfg(target_os = "macos")]
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        let title = self.generate_title();
        let tooltip = self.icon_manager.tooltip(&self.view);
        let config = self.generate_menu_config();
        self.icon_manager.state_changed(self.view.state);

        self.native = Some(native::NativeTray::build(&title, tooltip, &config)?);
        self.initialized = true;

        tracing::info!("トレイアイコンを初期化しました");
        Ok(())
    }

    /// Initializes the tray icon (non-macOS, no-op).
    #[cfg(not(target_os = "macos"))]
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        tracing::warn!("トレイアイコンはmacOSでのみサポートされています");
        self.initialized = true;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn poll_native_events(&mut self) {
        use tray_icon::menu::MenuEvent;
        use tray_icon::{MouseButton, MouseButtonState, TrayIconEvent};

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            self.handle_menu_click(MenuItemId::from_id(&event.id.0));
        }
        while let Ok(event) = TrayIconEvent::receiver().try_recv() {
            if let TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            } = event
            {
                self.handle_icon_click();
            }
        }
    }
}

impl std::fmt::Debug for TrayIconManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrayIconManager")
            .field("initialized", &self.initialized)
            .field("view", &self.view)
            .field("icon_manager", &self.icon_manager)
            .finish_non_exhaustive()
    }
}

#[cfg(target_os = "macos")]
mod native {
    use anyhow::Context;
    use tray_icon::menu::{Menu, MenuItem, PredefinedMenuItem};
    use tray_icon::{TrayIcon, TrayIconBuilder};

    use super::{MenuConfig, MenuItemId};

    pub(super) struct NativeTray {
        icon: TrayIcon,
        items: Vec<(MenuItemId, MenuItem)>,
    }

    impl NativeTray {
        pub(super) fn build(
            title: &str,
            tooltip: &str,
            config: &MenuConfig,
        ) -> anyhow::Result<Self> {
            let menu = Menu::new();
            menu.append(&MenuItem::new(&config.title.text, false, None))?;
            menu.append(&PredefinedMenuItem::separator())?;
            for item in &config.status_items {
                menu.append(&MenuItem::new(&item.text, false, None))?;
            }
            menu.append(&PredefinedMenuItem::separator())?;

            let mut items = Vec::new();
            for item in config.action_items() {
                if item.id == MenuItemId::Quit {
                    menu.append(&PredefinedMenuItem::separator())?;
                }
                let native = MenuItem::with_id(item.id.as_str(), &item.text, item.enabled, None);
                menu.append(&native)?;
                items.push((item.id, native));
            }

            let icon = TrayIconBuilder::new()
                .with_title(title)
                .with_tooltip(tooltip)
                .with_menu(Box::new(menu))
                .with_menu_on_left_click(false)
                .build()
                .context("トレイアイコンの作成に失敗しました")?;

            Ok(Self { icon, items })
        }

        pub(super) fn apply(&self, title: &str, tooltip: &str, config: Option<&MenuConfig>) {
            self.icon.set_title(Some(title));
            if let Err(e) = self.icon.set_tooltip(Some(tooltip)) {
                tracing::warn!(error = %e, "ツールチップの更新に失敗しました");
            }
            if let Some(config) = config {
                for (id, native) in &self.items {
                    if let Some(item) = config.action_items().into_iter().find(|i| i.id == *id) {
                        native.set_enabled(item.enabled);
                    }
                }
            }
        }
    }
}

// ============================================================================
// TrayBridge
// ============================================================================

/// Forwards tray-related bus messages to a [`TrayIconManager`].
pub struct TrayBridge {
    bus: Arc<dyn EventBus>,
    ids: Vec<ListenerId>,
}

impl TrayBridge {
    /// Subscribes to `tray-icon-state` and `timer-state-sync`.
    pub fn attach(bus: Arc<dyn EventBus>, updates: Sender<TrayUpdate>) -> Result<Self, BusError> {
        let mut bridge = Self {
            bus: Arc::clone(&bus),
            ids: Vec::new(),
        };

        let tx = updates.clone();
        bridge.ids.push(bus.listen(
            channels::TRAY_ICON_STATE,
            Arc::new(move |payload| {
                let state = payload
                    .get("state")
                    .cloned()
                    .and_then(|v| serde_json::from_value::<TrayIconState>(v).ok());
                match state {
                    Some(state) => {
                        let _ = tx.send(TrayUpdate::SetState(state));
                    }
                    None => tracing::warn!("不正なトレイ状態メッセージ"),
                }
            }),
        )?);

        let tx = updates;
        bridge.ids.push(bus.listen(
            channels::TIMER_STATE_SYNC,
            Arc::new(move |payload| {
                let clock = payload
                    .get("remainingMs")
                    .or_else(|| payload.get("elapsedMs"))
                    .and_then(Value::as_i64);
                if let Some(ms) = clock {
                    let _ = tx.send(TrayUpdate::SetClock(ms));
                }
            }),
        )?);

        Ok(bridge)
    }

    pub fn detach(&mut self) {
        for id in self.ids.drain(..) {
            let _ = self.bus.unlisten(id);
        }
    }
}

impl Drop for TrayBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

// ============================================================================
// Tests
// ============================================================================

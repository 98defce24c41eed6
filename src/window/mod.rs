//! Window handles for the main and floating windows.
//!
//! The application never talks to a windowing toolkit directly. Everything
//! goes through [`WindowHandle`], which covers the handful of operations the
//! reminder needs: geometry, visibility, focus and pinning.
//!
//! Sizes and positions reported by a window are physical pixels. Settings
//! store logical units, so [`PhysicalSize::to_logical`] and
//! [`PhysicalPosition::to_logical`] convert using the window's scale factor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

// ============================================================================
// WindowError
// ============================================================================

/// Errors reported by window handles.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The window no longer exists or was never created
    #[error("ウィンドウが利用できません: {0}")]
    NotAvailable(String),

    /// The toolkit rejected an operation
    #[error("ウィンドウ操作に失敗しました ({operation}): {message}")]
    OperationFailed {
        operation: &'static str,
        message: String,
    },

    /// Internal state lock was poisoned
    #[error("ウィンドウ状態のロックに失敗しました")]
    LockPoisoned,
}

impl WindowError {
    /// Returns true if the window itself is gone.
    pub fn is_not_available(&self) -> bool {
        matches!(self, WindowError::NotAvailable(_))
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            WindowError::NotAvailable(_) => "アプリケーションを再起動してください",
            WindowError::OperationFailed { .. } => "しばらくしてから再試行してください",
            WindowError::LockPoisoned => "アプリケーションを再起動してください",
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogicalPosition {
    pub x: f64,
    pub y: f64,
}

/// A non-positive scale factor is treated as 1.0.
fn effective_scale(scale_factor: f64) -> f64 {
    if scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    }
}

impl PhysicalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn to_logical(self, scale_factor: f64) -> LogicalSize {
        let scale = effective_scale(scale_factor);
        LogicalSize {
            width: f64::from(self.width) / scale,
            height: f64::from(self.height) / scale,
        }
    }
}

impl PhysicalPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_logical(self, scale_factor: f64) -> LogicalPosition {
        let scale = effective_scale(scale_factor);
        LogicalPosition {
            x: f64::from(self.x) / scale,
            y: f64::from(self.y) / scale,
        }
    }
}

impl LogicalSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn to_physical(self, scale_factor: f64) -> PhysicalSize {
        let scale = effective_scale(scale_factor);
        PhysicalSize {
            width: (self.width * scale).round().max(0.0) as u32,
            height: (self.height * scale).round().max(0.0) as u32,
        }
    }
}

impl LogicalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_physical(self, scale_factor: f64) -> PhysicalPosition {
        let scale = effective_scale(scale_factor);
        PhysicalPosition {
            x: (self.x * scale).round() as i32,
            y: (self.y * scale).round() as i32,
        }
    }
}

// ============================================================================
// WindowHandle
// ============================================================================

/// Operations the application performs on a window.
pub trait WindowHandle: Send + Sync {
    fn set_size(&self, size: LogicalSize) -> Result<(), WindowError>;

    fn set_position(&self, position: LogicalPosition) -> Result<(), WindowError>;

    fn show(&self) -> Result<(), WindowError>;

    fn hide(&self) -> Result<(), WindowError>;

    fn focus(&self) -> Result<(), WindowError>;

    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError>;

    /// Inner size in physical pixels.
    fn inner_size(&self) -> Result<PhysicalSize, WindowError>;

    /// Inner position in physical pixels.
    fn inner_position(&self) -> Result<PhysicalPosition, WindowError>;

    fn scale_factor(&self) -> Result<f64, WindowError>;
}

/// Reads the window geometry in logical units.
pub fn logical_geometry(
    window: &dyn WindowHandle,
) -> Result<(LogicalSize, LogicalPosition), WindowError> {
    let scale = window.scale_factor()?;
    let size = window.inner_size()?.to_logical(scale);
    let position = window.inner_position()?.to_logical(scale);
    Ok((size, position))
}

// ============================================================================
// HeadlessWindow
// ============================================================================

/// State tracked by the in-process window implementations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    pub size: PhysicalSize,
    pub position: PhysicalPosition,
    pub visible: bool,
    pub focused: bool,
    pub always_on_top: bool,
    pub scale_factor: f64,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            size: PhysicalSize::new(0, 0),
            position: PhysicalPosition::new(0, 0),
            visible: false,
            focused: false,
            always_on_top: false,
            scale_factor: 1.0,
        }
    }
}

/// A window with no on-screen surface.
///
/// Used when running without a GUI. Geometry and visibility are tracked in
/// memory so that save/restore behaves exactly as with a real window.
#[derive(Debug)]
pub struct HeadlessWindow {
    label: String,
    state: Mutex<WindowState>,
}

impl HeadlessWindow {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_scale_factor(label, 1.0)
    }

    pub fn with_scale_factor(label: impl Into<String>, scale_factor: f64) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(WindowState {
                scale_factor: effective_scale(scale_factor),
                ..WindowState::default()
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> WindowState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut WindowState) -> T) -> Result<T, WindowError> {
        let mut state = self.state.lock().map_err(|_| WindowError::LockPoisoned)?;
        Ok(f(&mut state))
    }
}

impl WindowHandle for HeadlessWindow {
    fn set_size(&self, size: LogicalSize) -> Result<(), WindowError> {
        self.with_state(|s| s.size = size.to_physical(s.scale_factor))?;
        tracing::debug!(window = %self.label, width = size.width, height = size.height, "ウィンドウサイズ変更");
        Ok(())
    }

    fn set_position(&self, position: LogicalPosition) -> Result<(), WindowError> {
        self.with_state(|s| s.position = position.to_physical(s.scale_factor))?;
        tracing::debug!(window = %self.label, x = position.x, y = position.y, "ウィンドウ位置変更");
        Ok(())
    }

    fn show(&self) -> Result<(), WindowError> {
        self.with_state(|s| s.visible = true)
    }

    fn hide(&self) -> Result<(), WindowError> {
        self.with_state(|s| {
            s.visible = false;
            s.focused = false;
        })
    }

    fn focus(&self) -> Result<(), WindowError> {
        self.with_state(|s| s.focused = true)
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError> {
        self.with_state(|s| s.always_on_top = on_top)
    }

    fn inner_size(&self) -> Result<PhysicalSize, WindowError> {
        self.with_state(|s| s.size)
    }

    fn inner_position(&self) -> Result<PhysicalPosition, WindowError> {
        self.with_state(|s| s.position)
    }

    fn scale_factor(&self) -> Result<f64, WindowError> {
        self.with_state(|s| s.scale_factor)
    }
}

// ============================================================================
// MockWindow
// ============================================================================

/// A window operation observed by [`MockWindow`].
#[derive(Debug, Clone, PartialEq)]
pub enum WindowCall {
    SetSize(LogicalSize),
    SetPosition(LogicalPosition),
    Show,
    Hide,
    Focus,
    SetAlwaysOnTop(bool),
}

/// Mock window for testing.
///
/// Records every mutating call in order and keeps a [`HeadlessWindow`] state
/// so geometry queries return what was last set.
#[derive(Debug)]
pub struct MockWindow {
    inner: HeadlessWindow,
    calls: Mutex<Vec<WindowCall>>,
    should_fail: AtomicBool,
}

impl Default for MockWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWindow {
    pub fn new() -> Self {
        Self::with_scale_factor(1.0)
    }

    pub fn with_scale_factor(scale_factor: f64) -> Self {
        Self {
            inner: HeadlessWindow::with_scale_factor("mock", scale_factor),
            calls: Mutex::new(Vec::new()),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Places the window without recording a call.
    pub fn place(&self, size: PhysicalSize, position: PhysicalPosition) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.size = size;
            state.position = position;
        }
    }

    pub fn calls(&self) -> Vec<WindowCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn state(&self) -> WindowState {
        self.inner.state()
    }

    fn record(&self, call: WindowCall) -> Result<(), WindowError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(WindowError::OperationFailed {
                operation: "mock",
                message: "Mock failure".to_string(),
            });
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }

    fn check(&self) -> Result<(), WindowError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(WindowError::NotAvailable("Mock failure".to_string()));
        }
        Ok(())
    }
}

impl WindowHandle for MockWindow {
    fn set_size(&self, size: LogicalSize) -> Result<(), WindowError> {
        self.record(WindowCall::SetSize(size))?;
        self.inner.set_size(size)
    }

    fn set_position(&self, position: LogicalPosition) -> Result<(), WindowError> {
        self.record(WindowCall::SetPosition(position))?;
        self.inner.set_position(position)
    }

    fn show(&self) -> Result<(), WindowError> {
        self.record(WindowCall::Show)?;
        self.inner.show()
    }

    fn hide(&self) -> Result<(), WindowError> {
        self.record(WindowCall::Hide)?;
        self.inner.hide()
    }

    fn focus(&self) -> Result<(), WindowError> {
        self.record(WindowCall::Focus)?;
        self.inner.focus()
    }

    fn set_always_on_top(&self, on_top: bool) -> Result<(), WindowError> {
        self.record(WindowCall::SetAlwaysOnTop(on_top))?;
        self.inner.set_always_on_top(on_top)
    }

    fn inner_size(&self) -> Result<PhysicalSize, WindowError> {
        self.check()?;
        self.inner.inner_size()
    }

    fn inner_position(&self) -> Result<PhysicalPosition, WindowError> {
        self.check()?;
        self.inner.inner_position()
    }

    fn scale_factor(&self) -> Result<f64, WindowError> {
        self.check()?;
        self.inner.scale_factor()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod geometry_tests {
        use super::*;

        #[test]
        fn test_physical_to_logical() {
            let size = PhysicalSize::new(900, 1100).to_logical(2.0);
            assert_eq!(size, LogicalSize::new(450.0, 550.0));

            let position = PhysicalPosition::new(200, -40).to_logical(2.0);
            assert_eq!(position, LogicalPosition::new(100.0, -20.0));
        }

        #[test]
        fn test_invalid_scale_factor_is_identity() {
            let size = PhysicalSize::new(300, 100).to_logical(0.0);
            assert_eq!(size, LogicalSize::new(300.0, 100.0));
        }

        #[test]
        fn test_logical_to_physical_rounds() {
            let size = LogicalSize::new(150.0, 50.0).to_physical(1.5);
            assert_eq!(size, PhysicalSize::new(225, 75));
        }
    }

    mod headless_tests {
        use super::*;

        #[test]
        fn test_geometry_round_trip_with_scale() {
            let window = HeadlessWindow::with_scale_factor("main", 2.0);
            window.set_size(LogicalSize::new(450.0, 550.0)).unwrap();
            window.set_position(LogicalPosition::new(10.0, 20.0)).unwrap();

            assert_eq!(window.inner_size().unwrap(), PhysicalSize::new(900, 1100));

            let (size, position) = logical_geometry(&window).unwrap();
            assert_eq!(size, LogicalSize::new(450.0, 550.0));
            assert_eq!(position, LogicalPosition::new(10.0, 20.0));
        }

        #[test]
        fn test_hide_clears_focus() {
            let window = HeadlessWindow::new("main");
            window.show().unwrap();
            window.focus().unwrap();
            assert!(window.state().focused);

            window.hide().unwrap();
            let state = window.state();
            assert!(!state.visible);
            assert!(!state.focused);
        }
    }

    mod mock_tests {
        use super::*;

        #[test]
        fn test_records_calls_in_order() {
            let window = MockWindow::new();
            window.show().unwrap();
            window.set_always_on_top(true).unwrap();
            window.focus().unwrap();

            assert_eq!(
                window.calls(),
                vec![
                    WindowCall::Show,
                    WindowCall::SetAlwaysOnTop(true),
                    WindowCall::Focus
                ]
            );
            assert!(window.state().always_on_top);
        }

        #[test]
        fn test_failure_mode() {
            let window = MockWindow::new();
            window.set_should_fail(true);

            assert!(window.show().is_err());
            assert!(window.inner_size().unwrap_err().is_not_available());
            assert!(window.calls().is_empty());
        }

        #[test]
        fn test_place_is_not_recorded() {
            let window = MockWindow::with_scale_factor(2.0);
            window.place(PhysicalSize::new(400, 200), PhysicalPosition::new(60, 80));

            let (size, position) = logical_geometry(&window).unwrap();
            assert_eq!(size, LogicalSize::new(200.0, 100.0));
            assert_eq!(position, LogicalPosition::new(30.0, 40.0));
            assert!(window.calls().is_empty());
        }
    }
}

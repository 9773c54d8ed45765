//! ava-controller contains the desktop manipulating functions: window
//! enumeration and focus, screen-rect capture, mouse and keyboard injection.

use std::time::Duration;

use anyhow::Result;
use image::DynamicImage;

mod platform;

pub use platform::create_desktop_controller;

/// Opaque OS window handle, kept as a plain integer so it stays `Send`
/// and serializable for the task manifests.
pub type WindowId = isize;

/// A window rectangle in screen coordinates. Window position can change
/// between automation steps, so these are always re-queried, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.left, self.top)
    }
}

#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub process_name: String,
    pub rect: WindowRect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowState {
    Normal,
    Minimized,
    Maximized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// [`DesktopController`] carries everything the automation engine needs
/// from the host desktop: the window manager, frame capture and input
/// injection. One implementation per platform; tests use in-memory fakes.
pub trait DesktopController: Send + Sync {
    // MARK: Window manager

    /// All visible top-level windows with a non-empty title.
    /// Enumeration order is OS-defined and not stable.
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    fn window_rect(&self, id: WindowId) -> Result<WindowRect>;

    fn window_exists(&self, id: WindowId) -> bool;

    fn set_foreground(&self, id: WindowId) -> Result<()>;

    fn show_state(&self, id: WindowId) -> Result<ShowState>;

    fn set_show_state(&self, id: WindowId, state: ShowState) -> Result<()>;

    // MARK: Frame capture

    /// Grab the pixels currently occupying `rect` on screen.
    fn capture_rect(&self, rect: WindowRect) -> Result<DynamicImage>;

    // MARK: Input injection
    //
    // All blocking, with an explicit post-action delay so the target
    // application has time to react before the next step reads its state.
    // No retries here; a failed injection propagates to the caller.

    fn click(
        &self,
        point: (i32, i32),
        button: MouseButton,
        clicks: u32,
        interval: Duration,
    ) -> Result<()>;

    fn drag(&self, start: (i32, i32), end: (i32, i32), duration: Duration) -> Result<()>;

    fn type_text(&self, text: &str, interval: Duration) -> Result<()>;

    /// Press the named keys in order, release in reverse order.
    fn hotkey(&self, keys: &[String], interval: Duration) -> Result<()>;
}

use anyhow::Result;

use ava_controller::{DesktopController, ShowState, WindowId, WindowInfo, WindowRect};
use ava_resource::manifest::WindowTarget;

use crate::Error;

/// Resolves a window target to a live handle.
///
/// A pinned handle is trusted as long as it is alive and never re-derived
/// from the title/process filters; handle reuse by the OS after the
/// original window closes is a known, accepted risk beyond the liveness
/// check. Without a pin, the first enumerated window passing the filters
/// wins. Enumeration order is OS-defined and unstable; targets that need
/// determinism should also set `process_name`.
pub fn resolve_window(
    controller: &dyn DesktopController,
    target: &WindowTarget,
) -> Result<WindowId> {
    if let Some(handle) = target.handle {
        if controller.window_exists(handle) {
            return Ok(handle);
        }
        return Err(Error::WindowNotFound.into());
    }

    for info in controller.list_windows()? {
        if matches_target(&info, target) {
            return Ok(info.id);
        }
    }
    Err(Error::WindowNotFound.into())
}

fn matches_target(info: &WindowInfo, target: &WindowTarget) -> bool {
    if let Some(title) = &target.title_contains {
        if !info.title.to_lowercase().contains(&title.to_lowercase()) {
            return false;
        }
    }
    if let Some(process) = &target.process_name {
        if !info.process_name.eq_ignore_ascii_case(process) {
            return false;
        }
    }
    true
}

/// Brings a window to the foreground without changing its show state.
///
/// A minimized window is left alone; restoring it would break workflows
/// that automate a window parked in the background. After foregrounding,
/// the prior show state is reasserted since the platform may restore a
/// maximized window on focus change. Best effort throughout: matching is
/// threshold based, not focus dependent, so activation failures are
/// swallowed.
pub fn activate_window(controller: &dyn DesktopController, id: WindowId) {
    let Ok(state) = controller.show_state(id) else {
        return;
    };
    if state == ShowState::Minimized {
        return;
    }
    let _ = controller.set_foreground(id);
    let _ = controller.set_show_state(id, state);
}

/// Maps a window-local point to absolute screen coordinates.
///
/// The rect provider is invoked fresh on every call; reusing a rect from
/// an earlier step after the window moved is a correctness bug, not a
/// performance one.
pub fn to_screen<F>(point: (i32, i32), rect_provider: F) -> Result<(i32, i32)>
where
    F: FnOnce() -> Result<WindowRect>,
{
    let rect = rect_provider()?;
    Ok((rect.left + point.0, rect.top + point.1))
}

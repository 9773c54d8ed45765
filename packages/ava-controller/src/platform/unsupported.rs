use anyhow::Result;

use crate::DesktopController;

/// Window management and input injection are only implemented against the
/// Win32 API. Other platforms can still build the workspace (the engine is
/// exercised with fake controllers in tests) but get no live backend.
pub fn create_desktop_controller() -> Result<Box<dyn DesktopController>> {
    anyhow::bail!(
        "no desktop controller backend for platform: {}",
        std::env::consts::OS
    )
}

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_os = "windows")] {
        mod windows_controller;
        use windows_controller as imp;
    } else {
        mod unsupported;
        use unsupported as imp;
    }
}

pub use imp::create_desktop_controller;

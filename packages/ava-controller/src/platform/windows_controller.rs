use std::time::Duration;

use crate::{DesktopController, MouseButton, ShowState, WindowId, WindowInfo, WindowRect};

use anyhow::Result;
use enigo::{
    Button,
    Coordinate::Abs,
    Direction::{Click, Press, Release},
    Enigo, Key, Keyboard, Mouse, Settings,
};
use windows::core::PWSTR;
use windows::Win32::{
    Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT},
    Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
        SRCCOPY,
    },
    System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    },
    UI::WindowsAndMessaging::{
        EnumWindows, GetDesktopWindow, GetWindowPlacement, GetWindowRect, GetWindowTextW,
        GetWindowThreadProcessId, IsWindow, IsWindowVisible, SetForegroundWindow, ShowWindow,
        SW_SHOWMAXIMIZED, SW_SHOWMINIMIZED, SW_SHOWNORMAL, WINDOWPLACEMENT,
    },
};

pub fn create_desktop_controller() -> Result<Box<dyn DesktopController>> {
    log::info!("desktop controller connecting in platform: windows");
    Ok(Box::new(WindowsController))
}

struct WindowsController;

fn hwnd(id: WindowId) -> HWND {
    HWND(id as *mut core::ffi::c_void)
}

impl DesktopController for WindowsController {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let mut entries: Vec<EnumWindowEntry> = Vec::new();

        unsafe {
            let _ = EnumWindows(
                Some(enum_window_proc),
                LPARAM(&mut entries as *mut _ as isize),
            );
        }

        let res = entries
            .into_iter()
            .map(|e| WindowInfo {
                id: e.handle,
                title: e.title,
                process_name: process_image_name(e.pid),
                rect: WindowRect::new(e.rect.left, e.rect.top, e.rect.right, e.rect.bottom),
            })
            .collect();

        Ok(res)
    }

    fn window_rect(&self, id: WindowId) -> Result<WindowRect> {
        let mut rect = RECT::default();
        unsafe {
            GetWindowRect(hwnd(id), &mut rect)?;
        }
        Ok(WindowRect::new(rect.left, rect.top, rect.right, rect.bottom))
    }

    fn window_exists(&self, id: WindowId) -> bool {
        unsafe { IsWindow(hwnd(id)).as_bool() }
    }

    fn set_foreground(&self, id: WindowId) -> Result<()> {
        let result = unsafe { SetForegroundWindow(hwnd(id)).as_bool() };
        if result {
            Ok(())
        } else {
            anyhow::bail!("failed to bring window {id} to foreground")
        }
    }

    fn show_state(&self, id: WindowId) -> Result<ShowState> {
        let mut placement = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        unsafe {
            GetWindowPlacement(hwnd(id), &mut placement)?;
        }
        let state = if placement.showCmd == SW_SHOWMINIMIZED.0 as u32 {
            ShowState::Minimized
        } else if placement.showCmd == SW_SHOWMAXIMIZED.0 as u32 {
            ShowState::Maximized
        } else {
            ShowState::Normal
        };
        Ok(state)
    }

    fn set_show_state(&self, id: WindowId, state: ShowState) -> Result<()> {
        let cmd = match state {
            ShowState::Normal => SW_SHOWNORMAL,
            ShowState::Minimized => SW_SHOWMINIMIZED,
            ShowState::Maximized => SW_SHOWMAXIMIZED,
        };
        unsafe {
            let _ = ShowWindow(hwnd(id), cmd);
        }
        Ok(())
    }

    fn capture_rect(&self, rect: WindowRect) -> Result<image::DynamicImage> {
        let width = rect.width().max(1);
        let height = rect.height().max(1);

        let mut buffer = unsafe {
            let desktop = GetDesktopWindow();
            let hdc_screen = GetDC(Some(desktop));
            let hdc_mem = CreateCompatibleDC(Some(hdc_screen));

            let hbm_capture = CreateCompatibleBitmap(hdc_screen, width as i32, height as i32);
            let _old_obj = SelectObject(hdc_mem, hbm_capture.into());

            let res = BitBlt(
                hdc_mem,
                0,
                0,
                width as i32,
                height as i32,
                Some(hdc_screen),
                rect.left,
                rect.top,
                SRCCOPY,
            );
            if res.is_err() {
                let _ = DeleteObject(hbm_capture.into());
                let _ = DeleteDC(hdc_mem);
                ReleaseDC(Some(desktop), hdc_screen);
                anyhow::bail!("failed to capture screen rect {:?}", rect);
            }

            let mut bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width as i32,
                    // negative height for a top-down bitmap
                    biHeight: -(height as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    biSizeImage: 0,
                    biXPelsPerMeter: 0,
                    biYPelsPerMeter: 0,
                    biClrUsed: 0,
                    biClrImportant: 0,
                },
                bmiColors: [windows::Win32::Graphics::Gdi::RGBQUAD::default(); 1],
            };

            let buffer_size = (width * height * 4) as usize;
            let mut buffer = vec![0u8; buffer_size];

            let _ = GetDIBits(
                hdc_mem,
                hbm_capture,
                0,
                height,
                Some(buffer.as_mut_ptr() as _),
                &mut bmi,
                DIB_RGB_COLORS,
            );

            let _ = DeleteObject(hbm_capture.into());
            let _ = DeleteDC(hdc_mem);
            ReleaseDC(Some(desktop), hdc_screen);

            buffer
        };

        // GDI hands pixels back as BGRA
        for px in buffer.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        let img = image::ImageBuffer::from_raw(width, height, buffer)
            .ok_or_else(|| anyhow::anyhow!("screen capture buffer size mismatch"))?;
        Ok(image::DynamicImage::ImageRgba8(img))
    }

    fn click(
        &self,
        point: (i32, i32),
        button: MouseButton,
        clicks: u32,
        interval: Duration,
    ) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())?;
        enigo
            .move_mouse(point.0, point.1, Abs)
            .map_err(|err| anyhow::anyhow!("mouse move failed: {err}"))?;
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
            MouseButton::Middle => Button::Middle,
        };
        for _ in 0..clicks.max(1) {
            enigo
                .button(button, Click)
                .map_err(|err| anyhow::anyhow!("mouse click failed: {err}"))?;
        }
        std::thread::sleep(interval);
        Ok(())
    }

    fn drag(&self, start: (i32, i32), end: (i32, i32), duration: Duration) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())?;

        enigo
            .move_mouse(start.0, start.1, Abs)
            .map_err(|err| anyhow::anyhow!("mouse move failed: {err}"))?;
        enigo
            .button(Button::Left, Press)
            .map_err(|err| anyhow::anyhow!("mouse press failed: {err}"))?;

        let steps = 20u32;
        let pause = duration / steps;
        let x_step = (end.0 - start.0) as f64 / steps as f64;
        let y_step = (end.1 - start.1) as f64 / steps as f64;

        for i in 1..=steps {
            enigo
                .move_mouse(
                    start.0 + (x_step * i as f64) as i32,
                    start.1 + (y_step * i as f64) as i32,
                    Abs,
                )
                .map_err(|err| anyhow::anyhow!("mouse move failed: {err}"))?;
            std::thread::sleep(pause);
        }

        enigo
            .button(Button::Left, Release)
            .map_err(|err| anyhow::anyhow!("mouse release failed: {err}"))?;
        Ok(())
    }

    fn type_text(&self, text: &str, interval: Duration) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())?;
        for ch in text.chars() {
            enigo
                .text(&ch.to_string())
                .map_err(|err| anyhow::anyhow!("text injection failed: {err}"))?;
            std::thread::sleep(interval);
        }
        Ok(())
    }

    fn hotkey(&self, keys: &[String], interval: Duration) -> Result<()> {
        let keys = keys
            .iter()
            .map(|name| parse_key(name))
            .collect::<Result<Vec<_>>>()?;

        let mut enigo = Enigo::new(&Settings::default())?;
        for key in &keys {
            enigo
                .key(*key, Press)
                .map_err(|err| anyhow::anyhow!("key press failed: {err}"))?;
        }
        for key in keys.iter().rev() {
            enigo
                .key(*key, Release)
                .map_err(|err| anyhow::anyhow!("key release failed: {err}"))?;
        }
        std::thread::sleep(interval);
        Ok(())
    }
}

struct EnumWindowEntry {
    handle: WindowId,
    title: String,
    pid: u32,
    rect: RECT,
}

extern "system" fn enum_window_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    unsafe {
        if !IsWindowVisible(hwnd).as_bool() {
            return true.into();
        }

        let mut title = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut title);
        if len == 0 {
            return true.into();
        }

        let mut rect = RECT::default();
        if GetWindowRect(hwnd, &mut rect).is_ok() {
            let mut pid = 0u32;
            let _ = GetWindowThreadProcessId(hwnd, Some(&mut pid));

            let entries: &mut Vec<EnumWindowEntry> = &mut *(lparam.0 as *mut Vec<EnumWindowEntry>);
            entries.push(EnumWindowEntry {
                handle: hwnd.0 as WindowId,
                title: String::from_utf16_lossy(&title[..len as usize]),
                pid,
                rect,
            });
        }

        true.into()
    }
}

/// Image file name (without directory) of the process owning a window,
/// or empty when the process cannot be opened.
fn process_image_name(pid: u32) -> String {
    unsafe {
        let Ok(handle) = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) else {
            return String::new();
        };

        let mut buf = [0u16; 512];
        let mut len = buf.len() as u32;
        let name = match QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut len,
        ) {
            Ok(()) => {
                let full = String::from_utf16_lossy(&buf[..len as usize]);
                full.rsplit(['\\', '/'])
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
            Err(_) => String::new(),
        };

        let _ = CloseHandle(handle);
        name
    }
}

fn parse_key(name: &str) -> Result<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "shift" => Key::Shift,
        "win" | "meta" | "super" => Key::Meta,
        "enter" | "return" => Key::Return,
        "esc" | "escape" => Key::Escape,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => anyhow::bail!("unknown key name: {name}"),
            }
        }
    };
    Ok(key)
}

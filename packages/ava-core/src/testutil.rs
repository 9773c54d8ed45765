//! In-memory desktop controller for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use image::DynamicImage;

use ava_controller::{
    DesktopController, MouseButton, ShowState, WindowId, WindowInfo, WindowRect,
};

pub struct FakeController {
    pub windows: Mutex<Vec<WindowInfo>>,
    pub frame: Mutex<DynamicImage>,
    pub clicks: Mutex<Vec<(i32, i32)>>,
    pub foreground: Mutex<Option<WindowId>>,
    pub states: Mutex<HashMap<WindowId, ShowState>>,
}

impl FakeController {
    pub const NOTEPAD_ID: WindowId = 11;
    pub const NOTEPAD_RECT: WindowRect = WindowRect {
        left: 40,
        top: 30,
        right: 240,
        bottom: 130,
    };

    /// One visible 200x100 Notepad window, frame filled with deterministic
    /// noise so correlation scores are meaningful.
    pub fn new() -> Self {
        let windows = vec![WindowInfo {
            id: Self::NOTEPAD_ID,
            title: "Untitled - Notepad".to_string(),
            process_name: "notepad.exe".to_string(),
            rect: Self::NOTEPAD_RECT,
        }];
        Self {
            windows: Mutex::new(windows),
            frame: Mutex::new(DynamicImage::ImageLuma8(noise_image(200, 100))),
            clicks: Mutex::new(Vec::new()),
            foreground: Mutex::new(None),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_frame(&self, frame: DynamicImage) {
        *self.frame.lock().unwrap() = frame;
    }

    pub fn set_show_state_for_test(&self, id: WindowId, state: ShowState) {
        self.states.lock().unwrap().insert(id, state);
    }
}

/// Deterministic texture so flat-image degenerate cases don't mask bugs.
pub fn noise_image(width: u32, height: u32) -> image::GrayImage {
    let mut state = 7u32;
    let data = (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            ((state >> 16) & 0xFF) as u8
        })
        .collect();
    image::GrayImage::from_vec(width, height, data).unwrap()
}

/// Copies a patch out of a frame, e.g. to save as a template image.
pub fn patch_of(frame: &image::GrayImage, x: u32, y: u32, w: u32, h: u32) -> image::GrayImage {
    image::GrayImage::from_fn(w, h, |tx, ty| *frame.get_pixel(x + tx, y + ty))
}

impl DesktopController for FakeController {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.windows.lock().unwrap().clone())
    }

    fn window_rect(&self, id: WindowId) -> Result<WindowRect> {
        self.windows
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.rect)
            .ok_or_else(|| anyhow::anyhow!("no window {id}"))
    }

    fn window_exists(&self, id: WindowId) -> bool {
        self.windows.lock().unwrap().iter().any(|w| w.id == id)
    }

    fn set_foreground(&self, id: WindowId) -> Result<()> {
        *self.foreground.lock().unwrap() = Some(id);
        Ok(())
    }

    fn show_state(&self, id: WindowId) -> Result<ShowState> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(ShowState::Normal))
    }

    fn set_show_state(&self, id: WindowId, state: ShowState) -> Result<()> {
        self.states.lock().unwrap().insert(id, state);
        Ok(())
    }

    fn capture_rect(&self, _rect: WindowRect) -> Result<DynamicImage> {
        Ok(self.frame.lock().unwrap().clone())
    }

    fn click(
        &self,
        point: (i32, i32),
        _button: MouseButton,
        _clicks: u32,
        _interval: Duration,
    ) -> Result<()> {
        self.clicks.lock().unwrap().push(point);
        Ok(())
    }

    fn drag(&self, _start: (i32, i32), _end: (i32, i32), _duration: Duration) -> Result<()> {
        Ok(())
    }

    fn type_text(&self, _text: &str, _interval: Duration) -> Result<()> {
        Ok(())
    }

    fn hotkey(&self, _keys: &[String], _interval: Duration) -> Result<()> {
        Ok(())
    }
}

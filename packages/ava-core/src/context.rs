use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Result;
use image::DynamicImage;
use log::debug;

use ava_controller::{DesktopController, MouseButton, WindowId, WindowRect};
use ava_resource::manifest::{
    template::DEFAULT_THRESHOLD, TemplateConfig, TemplateDef, WindowTarget,
};

use crate::{
    click::resolve_click_point,
    logbus::{LogBus, LogLevel},
    vision::{match_in_frame, MatchResult},
    window::{activate_window, resolve_window, to_screen},
    Error,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CLICK_INTERVAL: Duration = Duration::from_millis(200);

/// The scripting facade: one bound window target, one template catalog,
/// and the wait/appear/click primitives user scripts compose.
///
/// A context is owned exclusively by its task's thread; the primitives are
/// not designed for concurrent self-invocation.
pub struct AutomationContext {
    controller: Arc<dyn DesktopController>,
    target: Option<WindowTarget>,
    templates_config: PathBuf,
    log: Arc<LogBus>,
    task_id: String,
    cancel: Arc<AtomicBool>,
    window: Option<WindowId>,
}

impl AutomationContext {
    pub fn new(
        controller: Arc<dyn DesktopController>,
        target: Option<WindowTarget>,
        templates_config: PathBuf,
        log: Arc<LogBus>,
        task_id: impl Into<String>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            controller,
            target,
            templates_config,
            log,
            task_id: task_id.into(),
            cancel,
            window: None,
        }
    }

    /// Forwards to the log sink, tagged with this script's identity.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.log.log(level, message, Some(&self.task_id));
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// The bound window's live handle, resolved lazily and kept for the
    /// rest of the run. [`Self::invalidate_window`] forces re-resolution.
    pub fn window(&mut self) -> Result<WindowId> {
        if let Some(id) = self.window {
            return Ok(id);
        }
        let target = self.target.as_ref().ok_or(Error::TargetWindowNotFound)?;
        let id =
            resolve_window(&*self.controller, target).map_err(|_| Error::TargetWindowNotFound)?;
        self.window = Some(id);
        Ok(id)
    }

    pub fn invalidate_window(&mut self) {
        self.window = None;
    }

    fn window_rect(&mut self) -> Result<WindowRect> {
        let id = self.window()?;
        self.controller.window_rect(id)
    }

    pub fn ensure_window_focused(&mut self) -> Result<()> {
        let id = self.window()?;
        activate_window(&*self.controller, id);
        Ok(())
    }

    /// A fresh frame of the bound window, rect re-queried first. Never
    /// reuses a previous capture; acting on stale pixels is how phantom
    /// matches and double clicks happen.
    pub fn capture(&mut self) -> Result<DynamicImage> {
        let rect = self.window_rect()?;
        self.controller.capture_rect(rect)
    }

    /// Reloads the catalog from disk before looking the key up, so edits
    /// to the backing file take effect within one script step.
    pub fn resolve_template(&self, key: &str) -> Result<TemplateDef> {
        let catalog = TemplateConfig::load(&self.templates_config)?;
        catalog
            .get(key)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound(key.to_string()).into())
    }

    fn match_template(
        &mut self,
        def: &TemplateDef,
        threshold: Option<f32>,
    ) -> Result<Option<MatchResult>> {
        let frame = self.capture()?;
        let template = image::open(&def.file)
            .map_err(|err| anyhow::anyhow!("failed to open template image {:?}: {err}", def.file))?;
        let region = def.search_region.map(|region| {
            let (x, y, width, height) = region.to_absolute(frame.width(), frame.height());
            image::math::Rect {
                x,
                y,
                width,
                height,
            }
        });
        let threshold = threshold.or(def.threshold).unwrap_or(DEFAULT_THRESHOLD);
        Ok(match_in_frame(
            &frame,
            &template,
            threshold,
            region,
            def.method.unwrap_or_default(),
        ))
    }

    /// Whether the template is currently visible in the bound window.
    pub fn appear(&mut self, key: &str, threshold: Option<f32>) -> Result<bool> {
        let def = self.resolve_template(key)?;
        Ok(self.match_template(&def, threshold)?.is_some())
    }

    /// Polls [`Self::appear`] until the template shows up or `timeout`
    /// elapses (wall clock from call start). This is a spin poll; the
    /// windowing system offers no change notifications to subscribe to.
    /// Cancellation is observed at the top of each iteration, so its
    /// latency is one poll interval.
    pub fn wait_appear(
        &mut self,
        key: &str,
        timeout: Duration,
        poll: Duration,
        threshold: Option<f32>,
    ) -> Result<bool> {
        let start = Instant::now();
        while start.elapsed() <= timeout {
            if self.cancelled() {
                return Err(Error::Cancelled.into());
            }
            if self.appear(key, threshold)? {
                return Ok(true);
            }
            std::thread::sleep(poll);
        }
        Ok(false)
    }

    /// Symmetric to [`Self::wait_appear`]: true once the template is gone.
    pub fn disappear(&mut self, key: &str, timeout: Duration, poll: Duration) -> Result<bool> {
        let start = Instant::now();
        while start.elapsed() <= timeout {
            if self.cancelled() {
                return Err(Error::Cancelled.into());
            }
            if !self.appear(key, None)? {
                return Ok(true);
            }
            std::thread::sleep(poll);
        }
        Ok(false)
    }

    /// Matches and clicks in one step. No match is a normal outcome
    /// scripts branch on: it logs a warning and returns `false` rather
    /// than failing the run.
    pub fn click_template(
        &mut self,
        key: &str,
        threshold: Option<f32>,
        interval: Duration,
    ) -> Result<bool> {
        let def = self.resolve_template(key)?;
        let Some(matched) = self.match_template(&def, threshold)? else {
            self.log(LogLevel::Warn, format!("no match for template: {key}"));
            return Ok(false);
        };
        debug!(
            "template {key} matched {:?} at confidence {:.3}",
            matched.rect, matched.confidence
        );

        let point = resolve_click_point(
            matched.rect,
            def.click_mode.unwrap_or_default(),
            def.padding.unwrap_or_default(),
        );
        self.click_at((point.0 as i32, point.1 as i32), interval)?;
        Ok(true)
    }

    /// Waits for the template, then clicks it. Short-circuits `false` when
    /// the wait times out.
    pub fn appear_then_click(
        &mut self,
        key: &str,
        timeout: Duration,
        poll: Duration,
        threshold: Option<f32>,
    ) -> Result<bool> {
        if !self.wait_appear(key, timeout, poll, threshold)? {
            return Ok(false);
        }
        self.click_template(key, threshold, DEFAULT_CLICK_INTERVAL)
    }

    /// Clicks a window-local point, mapped through a freshly queried rect.
    pub fn click_at(&mut self, point: (i32, i32), interval: Duration) -> Result<()> {
        let id = self.window()?;
        let controller = &self.controller;
        let screen_point = to_screen(point, || controller.window_rect(id))?;
        self.controller
            .click(screen_point, MouseButton::Left, 1, interval)
            .map_err(|err| Error::InputInjection(err.to_string()))?;
        Ok(())
    }

    pub fn type_text(&self, text: &str, interval: Duration) -> Result<()> {
        self.controller
            .type_text(text, interval)
            .map_err(|err| Error::InputInjection(err.to_string()))?;
        Ok(())
    }

    pub fn hotkey(&self, keys: &[String], interval: Duration) -> Result<()> {
        self.controller
            .hotkey(keys, interval)
            .map_err(|err| Error::InputInjection(err.to_string()))?;
        Ok(())
    }

    /// OCR is not wired up; reads come back empty.
    pub fn read_text(&mut self, _key: &str) -> Result<String> {
        Ok(String::new())
    }

    pub fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::testutil::{noise_image, patch_of, FakeController};

    fn write_catalog(dir: &Path, frame: &image::GrayImage) {
        let images = dir.join("images");
        fs::create_dir_all(&images).unwrap();
        patch_of(frame, 30, 20, 10, 8)
            .save(images.join("present.png"))
            .unwrap();
        noise_image(12, 12).save(images.join("absent.png")).unwrap();
        fs::write(
            dir.join("templates.toml"),
            r#"
[templates.present]
file = "images/present.png"

[templates.absent]
file = "images/absent.png"
threshold = 0.98
"#,
        )
        .unwrap();
    }

    fn context_for(dir: &Path) -> (Arc<FakeController>, AutomationContext) {
        let controller = Arc::new(FakeController::new());
        let frame = noise_image(200, 100);
        write_catalog(dir, &frame);
        controller.set_frame(image::DynamicImage::ImageLuma8(frame));

        let ctx = AutomationContext::new(
            controller.clone(),
            Some(WindowTarget::with_title("Notepad")),
            dir.join("templates.toml"),
            Arc::new(LogBus::default()),
            "test-task",
            Arc::new(AtomicBool::new(false)),
        );
        (controller, ctx)
    }

    #[test]
    fn test_appear_and_disappear() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());

        assert!(ctx.appear("present", None).unwrap());
        assert!(!ctx.appear("absent", None).unwrap());
        assert!(ctx
            .disappear("absent", Duration::from_secs(1), Duration::from_millis(50))
            .unwrap());
    }

    #[test]
    fn test_missing_template_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());

        let err = ctx.appear("ghost", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TemplateNotFound(key)) if key == "ghost"
        ));
    }

    #[test]
    fn test_catalog_edits_visible_next_step() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());

        assert!(ctx.appear("present", None).unwrap());

        // retarget the key at an image that is not on screen
        fs::write(
            dir.path().join("templates.toml"),
            r#"
[templates.present]
file = "images/absent.png"
threshold = 0.98
"#,
        )
        .unwrap();
        assert!(!ctx.appear("present", None).unwrap());
    }

    #[test]
    fn test_click_template_clicks_screen_center() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut ctx) = context_for(dir.path());

        assert!(ctx
            .click_template("present", None, Duration::ZERO)
            .unwrap());

        // patch at (30,20) size 10x8, center (35,24); window top-left (40,30)
        let clicks = controller.clicks.lock().unwrap();
        assert_eq!(clicks.as_slice(), &[(75, 54)]);
    }

    #[test]
    fn test_click_template_no_match_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut ctx) = context_for(dir.path());

        assert!(!ctx.click_template("absent", None, Duration::ZERO).unwrap());
        assert!(controller.clicks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wait_appear_timeout_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());

        let timeout = Duration::from_millis(300);
        let poll = Duration::from_millis(100);
        let start = Instant::now();
        let appeared = ctx.wait_appear("absent", timeout, poll, None).unwrap();
        let elapsed = start.elapsed();

        assert!(!appeared);
        assert!(elapsed >= timeout, "returned after {elapsed:?}");
        assert!(
            elapsed < timeout + 4 * poll,
            "returned after {elapsed:?}, expected roughly timeout + one poll"
        );
    }

    #[test]
    fn test_wait_appear_observes_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());

        ctx.cancel.store(true, Ordering::Relaxed);
        let err = ctx
            .wait_appear(
                "absent",
                Duration::from_secs(10),
                Duration::from_millis(50),
                None,
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Cancelled)
        ));
    }

    #[test]
    fn test_appear_then_click() {
        let dir = tempfile::tempdir().unwrap();
        let (controller, mut ctx) = context_for(dir.path());

        assert!(ctx
            .appear_then_click(
                "present",
                Duration::from_secs(1),
                Duration::from_millis(50),
                None
            )
            .unwrap());
        assert_eq!(controller.clicks.lock().unwrap().len(), 1);

        assert!(!ctx
            .appear_then_click(
                "absent",
                Duration::from_millis(200),
                Duration::from_millis(50),
                None
            )
            .unwrap());
    }

    #[test]
    fn test_unbound_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let controller = Arc::new(FakeController::new());
        let mut ctx = AutomationContext::new(
            controller,
            None,
            dir.path().join("templates.toml"),
            Arc::new(LogBus::default()),
            "test-task",
            Arc::new(AtomicBool::new(false)),
        );
        let err = ctx.ensure_window_focused().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TargetWindowNotFound)
        ));
    }

    #[test]
    fn test_read_text_is_stubbed_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mut ctx) = context_for(dir.path());
        assert_eq!(ctx.read_text("present").unwrap(), "");
    }
}

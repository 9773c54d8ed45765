//! Built-in automation scripts. Task manifests reference these by their
//! registered entry name.

use std::time::Duration;

use anyhow::Result;

use ava_core::context::DEFAULT_POLL_INTERVAL;
use ava_core::{AutomationContext, LogLevel, Script, ScriptRegistry};

/// Logs a line and exits; smoke test for the task plumbing.
struct LogOnly;

impl Script for LogOnly {
    fn run(&mut self, ctx: &mut AutomationContext) -> Result<()> {
        ctx.log(LogLevel::Info, "hello from log_only");
        Ok(())
    }
}

/// Waits for the `log_button` template in the bound window and clicks it.
struct ClickLogButton;

impl Script for ClickLogButton {
    fn run(&mut self, ctx: &mut AutomationContext) -> Result<()> {
        ctx.log(LogLevel::Info, "waiting for log_button");
        let clicked = ctx.appear_then_click(
            "log_button",
            Duration::from_secs(5),
            DEFAULT_POLL_INTERVAL,
            None,
        )?;
        if clicked {
            ctx.log(LogLevel::Info, "clicked log_button");
        } else {
            ctx.log(LogLevel::Warn, "log_button never appeared");
        }
        Ok(())
    }
}

/// Clicks the save button once it shows up in the bound editor window.
struct ClickSaveButton;

impl Script for ClickSaveButton {
    fn run(&mut self, ctx: &mut AutomationContext) -> Result<()> {
        let clicked = ctx.appear_then_click(
            "save_button",
            Duration::from_secs(5),
            DEFAULT_POLL_INTERVAL,
            None,
        )?;
        if clicked {
            ctx.log(LogLevel::Info, "clicked save_button");
        } else {
            ctx.log(LogLevel::Warn, "save_button not found");
        }
        Ok(())
    }
}

pub fn registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register("log_only", || LogOnly);
    registry.register("click_log_button", || ClickLogButton);
    registry.register("click_save_button", || ClickSaveButton);
    registry
}

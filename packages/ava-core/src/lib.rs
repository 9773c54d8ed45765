//! The visual automation engine: window targeting, frame matching,
//! click resolution, the scripting facade and the task executor.

pub mod click;
pub mod context;
pub mod executor;
pub mod logbus;
pub mod tester;
pub mod vision;
pub mod window;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::AutomationContext;
pub use executor::{Script, ScriptRegistry, TaskExecutor, TaskState};
pub use logbus::{LogBus, LogLevel, LogRecord};

/// Errors the engine distinguishes programmatically. Everything else
/// travels as [`anyhow::Error`] with context attached.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No window satisfied the target's filters, or a pinned handle is dead.
    #[error("no window matches the target")]
    WindowNotFound,
    /// A task's bound window could not be resolved at use time.
    #[error("target window could not be resolved")]
    TargetWindowNotFound,
    #[error("template '{0}' not found in catalog")]
    TemplateNotFound(String),
    /// The manifest names a script entry nothing registered.
    #[error("script entry '{0}' is not registered")]
    ScriptNotFound(String),
    /// Synthetic input could not be delivered; fatal for the current step,
    /// never retried here.
    #[error("input injection failed: {0}")]
    InputInjection(String),
    /// Cooperative cancellation observed at a poll boundary.
    #[error("task cancelled")]
    Cancelled,
}

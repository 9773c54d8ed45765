use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use ava_controller::DesktopController;
use ava_resource::{manifest::TaskManifest, Resource};

use crate::{
    context::AutomationContext,
    logbus::{LogBus, LogLevel},
    Error,
};

/// Lifecycle of one task run: `Created` → `Running` → one of the
/// terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Created,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// A user automation script. Implementations register by entry name and
/// are constructed fresh for every run.
pub trait Script: Send {
    fn run(&mut self, ctx: &mut AutomationContext) -> Result<()>;
}

/// Plain functions and closures work as scripts too.
impl<F> Script for F
where
    F: FnMut(&mut AutomationContext) -> Result<()> + Send,
{
    fn run(&mut self, ctx: &mut AutomationContext) -> Result<()> {
        self(ctx)
    }
}

type ScriptFactory = Box<dyn Fn() -> Box<dyn Script> + Send + Sync>;

/// Maps script entry names to constructors. Scripts compile into the
/// binary; a manifest naming an unregistered entry fails before anything
/// runs.
#[derive(Default)]
pub struct ScriptRegistry {
    factories: HashMap<String, ScriptFactory>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, S>(&mut self, entry: impl Into<String>, factory: F)
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Script + 'static,
    {
        self.factories
            .insert(entry.into(), Box::new(move || Box::new(factory())));
    }

    pub fn create(&self, entry: &str) -> Result<Box<dyn Script>> {
        self.factories
            .get(entry)
            .map(|factory| factory())
            .ok_or_else(|| Error::ScriptNotFound(entry.to_string()).into())
    }

    pub fn entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        entries.sort_unstable();
        entries
    }
}

struct TaskRun {
    state: Arc<Mutex<TaskState>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// How long `stop` waits for a script to notice the cancellation flag.
const STOP_WAIT: Duration = Duration::from_secs(1);

/// Runs registered scripts on dedicated threads and tracks their
/// lifecycle. `run` is fire and forget: script failures land in the log
/// sink and the task's terminal state, never at the call site. Tasks are
/// independent of each other; within one task, primitives execute in the
/// exact order the script issues them.
pub struct TaskExecutor {
    controller: Arc<dyn DesktopController>,
    registry: ScriptRegistry,
    resource: Resource,
    log: Arc<LogBus>,
    runs: Mutex<HashMap<String, TaskRun>>,
}

impl TaskExecutor {
    pub fn new(
        controller: Arc<dyn DesktopController>,
        registry: ScriptRegistry,
        resource: Resource,
        log: Arc<LogBus>,
    ) -> Self {
        Self {
            controller,
            registry,
            resource,
            log,
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn log(&self) -> &Arc<LogBus> {
        &self.log
    }

    /// Starts a task on its own thread. Fails synchronously only when the
    /// entry is unregistered or the same id is already running; everything
    /// that happens after launch is reported through state and logs.
    pub fn run(&self, id: &str, manifest: &TaskManifest) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs.get(id) {
            if *run.state.lock().unwrap() == TaskState::Running {
                anyhow::bail!("task {id} is already running");
            }
        }

        let mut script = match self.registry.create(&manifest.entry) {
            Ok(script) => script,
            Err(err) => {
                self.log.log(
                    LogLevel::Error,
                    format!("task {id} failed to load: {err}"),
                    Some(id),
                );
                runs.insert(
                    id.to_string(),
                    TaskRun {
                        state: Arc::new(Mutex::new(TaskState::Failed)),
                        cancel: Arc::new(AtomicBool::new(false)),
                        handle: None,
                    },
                );
                return Err(err);
            }
        };

        self.log.log(
            LogLevel::Info,
            format!("starting task {id}: {}", manifest.name),
            Some(id),
        );

        let state = Arc::new(Mutex::new(TaskState::Created));
        let cancel = Arc::new(AtomicBool::new(false));

        let mut ctx = AutomationContext::new(
            self.controller.clone(),
            manifest.target_window.clone(),
            manifest.templates_config(&self.resource.root),
            self.log.clone(),
            id,
            cancel.clone(),
        );

        let thread_state = state.clone();
        let log = self.log.clone();
        let id_owned = id.to_string();
        let has_target = manifest.target_window.is_some();

        let handle = std::thread::spawn(move || {
            *thread_state.lock().unwrap() = TaskState::Running;

            if has_target {
                if let Err(err) = ctx.ensure_window_focused() {
                    log.log(
                        LogLevel::Error,
                        format!("task {id_owned} failed: {err}"),
                        Some(&id_owned),
                    );
                    *thread_state.lock().unwrap() = TaskState::Failed;
                    return;
                }
            }

            let outcome = script.run(&mut ctx);
            let mut state = thread_state.lock().unwrap();
            match outcome {
                Ok(()) => {
                    log.log(
                        LogLevel::Info,
                        format!("task {id_owned} finished"),
                        Some(&id_owned),
                    );
                    *state = TaskState::Finished;
                }
                Err(err) => {
                    if matches!(err.downcast_ref::<Error>(), Some(Error::Cancelled)) {
                        log.log(
                            LogLevel::Info,
                            format!("task {id_owned} cancelled"),
                            Some(&id_owned),
                        );
                        *state = TaskState::Cancelled;
                    } else {
                        log.log(
                            LogLevel::Error,
                            format!("task {id_owned} failed: {err}"),
                            Some(&id_owned),
                        );
                        *state = TaskState::Failed;
                    }
                }
            }
        });

        runs.insert(
            id.to_string(),
            TaskRun {
                state,
                cancel,
                handle: Some(handle),
            },
        );
        Ok(())
    }

    /// Sets the cooperative cancellation flag and waits briefly for the
    /// script to observe it at its next poll boundary. There is no
    /// preemption: a primitive mid-match or mid-click always completes,
    /// so cancellation latency equals the current poll interval, and a
    /// script that never polls runs to completion.
    pub fn stop(&self, id: &str) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("no run for task {id}"))?;
        run.cancel.store(true, Ordering::Relaxed);

        if let Some(handle) = &run.handle {
            let start = Instant::now();
            while start.elapsed() < STOP_WAIT && !handle.is_finished() {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                if let Some(handle) = run.handle.take() {
                    let _ = handle.join();
                }
            }
        }
        Ok(())
    }

    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.runs
            .lock()
            .unwrap()
            .get(id)
            .map(|run| *run.state.lock().unwrap())
    }

    pub fn states(&self) -> HashMap<String, TaskState> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, run)| (id.clone(), *run.state.lock().unwrap()))
            .collect()
    }
}

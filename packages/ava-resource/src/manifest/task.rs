use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;

/// How a task names the window it automates. Resolution prefers a pinned
/// handle; once supplied, a live handle is never re-derived from the
/// title/process filters.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WindowTarget {
    pub handle: Option<isize>,
    pub title_contains: Option<String>,
    pub process_name: Option<String>,
}

impl WindowTarget {
    pub fn with_title<S: AsRef<str>>(title: S) -> Self {
        Self {
            title_contains: Some(title.as_ref().to_string()),
            ..Default::default()
        }
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskManifest {
    pub name: String,
    /// Registered script entry, resolved through the executor's registry.
    pub entry: String,
    /// Template catalog for this task, relative to the task directory.
    /// Falls back to the shared catalog at the resource root.
    pub templates: Option<PathBuf>,
    pub target_window: Option<WindowTarget>,
    /// Directory the manifest was discovered in; not part of the file.
    #[serde(skip)]
    pub dir: Option<PathBuf>,
}

impl TaskManifest {
    /// The catalog this task reads its templates from.
    pub fn templates_config(&self, resource_root: &Path) -> PathBuf {
        match &self.templates {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => match &self.dir {
                Some(dir) => dir.join(p),
                None => resource_root.join(p),
            },
            None => match &self.dir {
                Some(dir) if dir.join("templates.toml").exists() => dir.join("templates.toml"),
                _ => resource_root.join("templates.toml"),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct TaskConfig(pub HashMap<String, TaskManifest>);

impl TaskConfig {
    /// Loads `tasks.toml` at the root (if present), then merges per-task
    /// directories under `tasks/`, keyed by directory name. Unreadable
    /// directory manifests are skipped so one broken task never hides the
    /// rest.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        let mut task_config = TaskConfig::default();
        let tasks_file = root.join("tasks.toml");
        if tasks_file.exists() {
            let raw = fs::read_to_string(&tasks_file)?;
            task_config = toml::from_str::<TaskConfig>(&raw)?;
        }

        if let Ok(read_dir) = fs::read_dir(root.join("tasks")) {
            for entry in read_dir {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let manifest_file = entry.path().join("task.toml");
                if !manifest_file.exists() {
                    continue;
                }
                let parsed = fs::read_to_string(&manifest_file)
                    .map_err(anyhow::Error::from)
                    .and_then(|raw| toml::from_str::<TaskManifest>(&raw).map_err(Into::into));
                match parsed {
                    Ok(mut manifest) => {
                        manifest.dir = Some(entry.path());
                        let id = entry.file_name().to_string_lossy().to_string();
                        task_config.0.insert(id, manifest);
                    }
                    Err(err) => {
                        warn!("skipping task manifest {:?}: {err}", manifest_file);
                    }
                }
            }
        }

        Ok(task_config)
    }

    pub fn get(&self, id: &str) -> Option<&TaskManifest> {
        self.0.get(id)
    }
}

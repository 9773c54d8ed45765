//! On-disk layout of templates and task manifests.
//!
//! A resource root holds a shared template catalog (`templates.toml`,
//! images next to it) and a `tasks/` directory where every task owns its
//! manifest and, optionally, its own catalog and images.

use std::path::{Path, PathBuf};

use anyhow::Result;

pub mod manifest;

use manifest::task::TaskConfig;

#[derive(Debug, Clone)]
pub struct Resource {
    pub root: PathBuf,
}

impl Resource {
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            anyhow::bail!("resource root {:?} is not a directory", root);
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// The shared template catalog, used by tasks that do not carry their own.
    pub fn templates_config(&self) -> PathBuf {
        self.root.join("templates.toml")
    }

    pub fn tasks_root(&self) -> PathBuf {
        self.root.join("tasks")
    }

    /// Task manifests are re-read on every call so edits take effect
    /// without a restart.
    pub fn task_config(&self) -> Result<TaskConfig> {
        TaskConfig::load(&self.root)
    }
}

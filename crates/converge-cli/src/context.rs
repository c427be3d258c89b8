//! Per-invocation context
//!
//! Resolves settings once and hands commands the pieces they share: the
//! snapshot store, the fragment loader and the configured executor.

use crate::error::{CliError, Result};
use crate::hook::CommandExecutor;
use crate::settings::{Overrides, Settings, SettingsResolver};
use converge_core::{
    ConfigTree, Executor, FileSnapshotStore, Loader, RecordingExecutor, Schema, load_schema,
};
use std::path::{Path, PathBuf};

/// Global command-line options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub global_config_dir: Option<PathBuf>,
}

pub struct Context {
    root: PathBuf,
    settings: Settings,
}

impl Context {
    /// Resolve settings for a run started in `root`.
    pub fn load(root: &Path, options: &GlobalOptions, fragments: Vec<PathBuf>) -> Result<Self> {
        let settings = SettingsResolver::new(root)
            .with_config_file(options.config.clone())
            .with_global_config_dir(options.global_config_dir.clone())
            .resolve(Overrides {
                state_dir: options.state_dir.clone(),
                schema: options.schema.clone(),
                fragments,
            })?;
        Ok(Self {
            root: root.to_path_buf(),
            settings,
        })
    }

    pub fn store(&self) -> Result<FileSnapshotStore> {
        Ok(FileSnapshotStore::open(&self.settings.state_dir)?)
    }

    /// Load and merge the configured fragments.
    pub fn desired(&self) -> Result<ConfigTree> {
        if self.settings.fragments.is_empty() {
            return Err(CliError::user(
                "No fragments given. Name them on the command line or set `fragments` in converge.toml",
            ));
        }

        let schema = match &self.settings.schema {
            Some(path) => load_schema(path)?,
            None => {
                tracing::warn!("no schema configured, every top-level key will be rejected");
                Schema::new()
            }
        };
        Ok(Loader::new(schema).load_files(&self.settings.fragments)?)
    }

    /// The hook program when one is configured, otherwise an executor that
    /// only logs.
    pub fn executor(&self) -> Box<dyn Executor> {
        match &self.settings.hook {
            Some(hook) => Box::new(CommandExecutor::new(hook, &self.root)),
            None => Box::new(RecordingExecutor::new()),
        }
    }
}

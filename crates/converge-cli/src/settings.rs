//! Layered settings
//!
//! Settings are read from, in order:
//! 1. Global settings (`<config_dir>/converge/config.toml`)
//! 2. Project settings (`./converge.toml`, or the file given with `--config`)
//! 3. Command-line flags
//!
//! Later layers override earlier ones key by key. Relative paths in a
//! settings file are resolved against the directory holding that file;
//! relative paths on the command line against the working directory.

use crate::error::{CliError, Result};
use converge_fs::ConfigStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default project settings file name
pub const PROJECT_FILE: &str = "converge.toml";

/// Default state directory, relative to the working directory
pub const DEFAULT_STATE_DIR: &str = ".converge";

/// External program used as the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSettings {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// One settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsLayer {
    state_dir: Option<PathBuf>,
    schema: Option<PathBuf>,
    fragments: Option<Vec<PathBuf>>,
    hook: Option<HookSettings>,
}

impl SettingsLayer {
    /// Anchor relative paths at `base`.
    fn anchored(mut self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.state_dir = self.state_dir.map(anchor);
        self.schema = self.schema.map(anchor);
        self.fragments = self
            .fragments
            .map(|fragments| fragments.into_iter().map(anchor).collect());
        self
    }

    /// Overlay `other` on top of `self`.
    fn overlay(self, other: SettingsLayer) -> Self {
        Self {
            state_dir: other.state_dir.or(self.state_dir),
            schema: other.schema.or(self.schema),
            fragments: other.fragments.or(self.fragments),
            hook: other.hook.or(self.hook),
        }
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub state_dir: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    /// Empty means "use the configured fragments"
    pub fragments: Vec<PathBuf>,
}

/// The effective settings after merging all layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub state_dir: PathBuf,
    pub schema: Option<PathBuf>,
    pub fragments: Vec<PathBuf>,
    pub hook: Option<HookSettings>,
}

/// Resolves [`Settings`] for a working directory.
pub struct SettingsResolver {
    root: PathBuf,
    config_file: Option<PathBuf>,
    /// Override for the global config directory (used for testing).
    /// When `None`, the platform directory from `dirs::config_dir()` is used.
    global_config_dir_override: Option<PathBuf>,
}

impl SettingsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config_file: None,
            global_config_dir_override: None,
        }
    }

    /// Use `path` as the project settings file. Unlike the default
    /// `converge.toml`, it must exist.
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path.map(|p| self.anchor(p));
        self
    }

    pub fn with_global_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.global_config_dir_override = dir.map(|d| self.anchor(d));
        self
    }

    fn anchor(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.global_config_dir_override {
            return Some(dir.clone());
        }
        dirs::config_dir().map(|d| d.join("converge"))
    }

    pub fn resolve(&self, overrides: Overrides) -> Result<Settings> {
        let mut merged = SettingsLayer::default();

        if let Some(global_dir) = self.global_config_dir() {
            let path = global_dir.join("config.toml");
            if let Some(layer) = read_layer(&path, false)? {
                tracing::debug!(path = %path.display(), "loaded global settings");
                merged = merged.overlay(layer);
            }
        }

        let (project_path, required) = match &self.config_file {
            Some(path) => (path.clone(), true),
            None => (self.root.join(PROJECT_FILE), false),
        };
        if let Some(layer) = read_layer(&project_path, required)? {
            tracing::debug!(path = %project_path.display(), "loaded project settings");
            merged = merged.overlay(layer);
        }

        let flags = SettingsLayer {
            state_dir: overrides.state_dir,
            schema: overrides.schema,
            fragments: (!overrides.fragments.is_empty()).then_some(overrides.fragments),
            hook: None,
        };
        merged = merged.overlay(flags.anchored(&self.root));

        let settings = Settings {
            state_dir: merged
                .state_dir
                .unwrap_or_else(|| self.root.join(DEFAULT_STATE_DIR)),
            schema: merged.schema,
            fragments: merged.fragments.unwrap_or_default(),
            hook: merged.hook,
        };
        tracing::debug!(?settings, "settings resolved");
        Ok(settings)
    }
}

fn read_layer(path: &Path, required: bool) -> Result<Option<SettingsLayer>> {
    if !path.is_file() {
        if required {
            return Err(CliError::user(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }
        return Ok(None);
    }

    let layer: SettingsLayer = ConfigStore::new().load(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(Some(layer.anchored(base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct Dirs {
        project: TempDir,
        global: TempDir,
    }

    impl Dirs {
        fn new() -> Self {
            Self {
                project: TempDir::new().unwrap(),
                global: TempDir::new().unwrap(),
            }
        }

        fn resolver(&self) -> SettingsResolver {
            SettingsResolver::new(self.project.path())
                .with_global_config_dir(Some(self.global.path().to_path_buf()))
        }
    }

    #[test]
    fn defaults_without_any_file() {
        let dirs = Dirs::new();

        let settings = dirs.resolver().resolve(Overrides::default()).unwrap();

        assert_eq!(
            settings,
            Settings {
                state_dir: dirs.project.path().join(".converge"),
                schema: None,
                fragments: vec![],
                hook: None,
            }
        );
    }

    #[test]
    fn project_overrides_global_and_flags_override_project() {
        let dirs = Dirs::new();
        fs::write(
            dirs.global.path().join("config.toml"),
            "state_dir = \"/var/lib/converge\"\nschema = \"global-schema.toml\"\n\n[hook]\nprogram = \"apply-op\"\n",
        )
        .unwrap();
        fs::write(
            dirs.project.path().join("converge.toml"),
            "schema = \"schema.toml\"\nfragments = [\"base.toml\", \"host.toml\"]\n",
        )
        .unwrap();

        let settings = dirs
            .resolver()
            .resolve(Overrides {
                state_dir: Some(PathBuf::from("state")),
                ..Overrides::default()
            })
            .unwrap();

        assert_eq!(settings.state_dir, dirs.project.path().join("state"));
        assert_eq!(settings.schema, Some(dirs.project.path().join("schema.toml")));
        assert_eq!(
            settings.fragments,
            vec![
                dirs.project.path().join("base.toml"),
                dirs.project.path().join("host.toml")
            ]
        );
        assert_eq!(
            settings.hook,
            Some(HookSettings {
                program: "apply-op".to_string(),
                args: vec![],
            })
        );
    }

    #[test]
    fn command_line_fragments_replace_configured_ones() {
        let dirs = Dirs::new();
        fs::write(
            dirs.project.path().join("converge.toml"),
            "fragments = [\"base.toml\"]\n",
        )
        .unwrap();

        let settings = dirs
            .resolver()
            .resolve(Overrides {
                fragments: vec![PathBuf::from("other.yaml")],
                ..Overrides::default()
            })
            .unwrap();

        assert_eq!(settings.fragments, vec![dirs.project.path().join("other.yaml")]);
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dirs = Dirs::new();

        let err = dirs
            .resolver()
            .with_config_file(Some(PathBuf::from("missing.toml")))
            .resolve(Overrides::default())
            .unwrap_err();

        assert!(err.to_string().starts_with("Settings file not found"));
    }

    #[test]
    fn unknown_settings_keys_are_rejected() {
        let dirs = Dirs::new();
        fs::write(dirs.project.path().join("converge.toml"), "stat_dir = \"x\"\n").unwrap();

        assert!(dirs.resolver().resolve(Overrides::default()).is_err());
    }
}

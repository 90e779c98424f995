//! Where crumbcast keeps its files.
//!
//! Everything lives in one `.crumbcast` folder under the OS config directory
//! (`~/.config` on Linux, `%APPDATA%` on Windows): `config.toml`, run logs in
//! `logs/` and the model store in `models/`. Setting `CRUMBCAST_CONFIG_HOME`
//! replaces the OS config directory, which portable installs and the
//! integration tests rely on.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the config base.
pub const APP_DIR_NAME: &str = ".crumbcast";
/// Environment variable replacing the OS config directory.
pub const CONFIG_HOME_ENV: &str = "CRUMBCAST_CONFIG_HOME";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("Neither CRUMBCAST_CONFIG_HOME nor an OS config directory is available")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Fixed locations inside the app root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSubdir {
    Logs,
    Models,
}

impl AppSubdir {
    pub fn name(self) -> &'static str {
        match self {
            AppSubdir::Logs => "logs",
            AppSubdir::Models => "models",
        }
    }

    /// The model store creates its directory on the first save, so an
    /// untrained install has no `models/`.
    fn created_on_lookup(self) -> bool {
        matches!(self, AppSubdir::Logs)
    }

    pub fn path(self) -> Result<PathBuf, AppDirError> {
        let path = app_root_dir()?.join(self.name());
        if self.created_on_lookup() {
            create(&path)?;
        }
        Ok(path)
    }
}

/// The `.crumbcast` root, created if missing.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let root = config_base()?.join(APP_DIR_NAME);
    create(&root)?;
    Ok(root)
}

pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    AppSubdir::Logs.path()
}

pub fn default_models_dir() -> Result<PathBuf, AppDirError> {
    AppSubdir::Models.path()
}

fn create(path: &Path) -> Result<(), AppDirError> {
    std::fs::create_dir_all(path).map_err(|source| AppDirError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn config_base() -> Result<PathBuf, AppDirError> {
    if let Some(path) = base_override() {
        return Ok(path);
    }
    std::env::var_os(CONFIG_HOME_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
        .ok_or(AppDirError::NoBaseDir)
}

#[cfg(not(test))]
fn base_override() -> Option<PathBuf> {
    None
}

#[cfg(test)]
fn base_override() -> Option<PathBuf> {
    test_support::current_base()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;
    use std::path::PathBuf;

    thread_local! {
        static BASE: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
    }

    pub(super) fn current_base() -> Option<PathBuf> {
        BASE.with(|base| base.borrow().clone())
    }

    /// Points the app root of the current test thread at `path` until dropped.
    pub(crate) struct OverrideGuard {
        previous: Option<PathBuf>,
    }

    impl OverrideGuard {
        pub(crate) fn set(path: PathBuf) -> Self {
            let previous = BASE.with(|base| base.replace(Some(path)));
            Self { previous }
        }
    }

    impl Drop for OverrideGuard {
        fn drop(&mut self) {
            let previous = self.previous.take();
            BASE.with(|base| base.replace(previous));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::OverrideGuard;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn root_lives_under_override_base() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let root = app_root_dir().unwrap();
        assert_eq!(root, base.path().join(APP_DIR_NAME));
        assert!(root.is_dir());
    }

    #[test]
    fn logs_are_created_but_models_wait_for_a_save() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        assert!(logs_dir().unwrap().is_dir());
        let models = default_models_dir().unwrap();
        assert_eq!(models, base.path().join(APP_DIR_NAME).join("models"));
        assert!(!models.exists());
    }

    #[test]
    fn nested_guards_restore_the_outer_base() {
        let outer = tempdir().unwrap();
        let inner = tempdir().unwrap();
        let _outer = OverrideGuard::set(outer.path().to_path_buf());
        {
            let _inner = OverrideGuard::set(inner.path().to_path_buf());
            assert!(app_root_dir().unwrap().starts_with(inner.path()));
        }
        assert!(app_root_dir().unwrap().starts_with(outer.path()));
    }
}

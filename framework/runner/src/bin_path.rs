use std::env;
use std::path::{Path, PathBuf};

use plateau_sweep_core::prelude::SweepError;

/// Environment variable to override the path to the load generator executable.
pub const SWEEP_LOCUST_PATH_ENV: &str = "SWEEP_LOCUST_PATH";

/// Virtual environment used when none is given, if it provides `locust`.
pub const DEFAULT_VENV: &str = "~/locust-env";

/// Get the path to the load generator executable.
///
/// In order of precedence:
/// - the value of [`SWEEP_LOCUST_PATH_ENV`], which must point at an existing file
/// - `<venv>/bin/locust` if a virtual environment is given, with a leading `~` expanded to the
///   user's home directory
/// - `<DEFAULT_VENV>/bin/locust` if no virtual environment is given and that file exists
/// - `locust` looked up on the user's `PATH`
pub fn locust_path(venv: Option<&Path>) -> Result<PathBuf, SweepError> {
    match env::var(SWEEP_LOCUST_PATH_ENV).ok().as_deref() {
        Some("") => Err(SweepError::LoadGeneratorNotFound(format!(
            "'{SWEEP_LOCUST_PATH_ENV}' set to empty string"
        ))),
        Some(path) => {
            let locust_path = PathBuf::from(path);
            if !locust_path.exists() {
                return Err(SweepError::LoadGeneratorNotFound(format!(
                    "Path overridden with '{SWEEP_LOCUST_PATH_ENV}={path}' but that path doesn't exist"
                )));
            }
            Ok(locust_path)
        }
        None => match venv {
            Some(venv) => {
                let locust_path = expand_home(venv).join("bin").join("locust");
                if !locust_path.exists() {
                    return Err(SweepError::LoadGeneratorNotFound(format!(
                        "No locust executable in virtual environment, expected {}",
                        locust_path.display()
                    )));
                }
                Ok(locust_path)
            }
            None => {
                let default_locust = expand_home(Path::new(DEFAULT_VENV))
                    .join("bin")
                    .join("locust");
                if default_locust.exists() {
                    log::debug!("Using locust from {}", default_locust.display());
                    return Ok(default_locust);
                }

                log::debug!("No virtual environment given so looking for locust in user's 'PATH'");
                which::which("locust").map_err(|_| {
                    SweepError::LoadGeneratorNotFound(format!(
                        "locust not found in PATH. Install it, pass --venv-path or set '{SWEEP_LOCUST_PATH_ENV}'"
                    ))
                })
            }
        },
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt as _;

    use serial_test::serial;
    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    fn write_executable(path: &Path) {
        std::fs::write(path, "#!/bin/sh\n").expect("failed to write executable");
        #[cfg(unix)]
        {
            let mut perms = std::fs::metadata(path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms).unwrap();
        }
    }

    #[test]
    #[serial]
    fn test_should_not_get_locust_path_if_override_does_not_exist() {
        env::set_var(SWEEP_LOCUST_PATH_ENV, "/non/existent/path/to/locust");
        let result = locust_path(None);
        env::remove_var(SWEEP_LOCUST_PATH_ENV);

        assert!(matches!(result, Err(SweepError::LoadGeneratorNotFound(_))));
    }

    #[test]
    #[serial]
    fn test_should_reject_empty_override() {
        env::set_var(SWEEP_LOCUST_PATH_ENV, "");
        let result = locust_path(None);
        env::remove_var(SWEEP_LOCUST_PATH_ENV);

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_should_prefer_override_over_venv() {
        let temp = NamedTempFile::new().expect("failed to create temp file");
        env::set_var(SWEEP_LOCUST_PATH_ENV, temp.path());
        let result = locust_path(Some(Path::new("/non/existent/venv")));
        env::remove_var(SWEEP_LOCUST_PATH_ENV);

        assert_eq!(result.unwrap(), temp.path());
    }

    #[test]
    #[serial]
    fn test_should_get_locust_from_venv() {
        env::remove_var(SWEEP_LOCUST_PATH_ENV);
        let venv = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir(venv.path().join("bin")).unwrap();
        write_executable(&venv.path().join("bin").join("locust"));

        let result = locust_path(Some(venv.path())).unwrap();
        assert_eq!(result, venv.path().join("bin").join("locust"));
    }

    #[test]
    #[serial]
    fn test_should_not_get_locust_from_venv_without_it() {
        env::remove_var(SWEEP_LOCUST_PATH_ENV);
        let venv = TempDir::new().expect("failed to create temp dir");

        assert!(locust_path(Some(venv.path())).is_err());
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_should_get_locust_from_path() {
        env::remove_var(SWEEP_LOCUST_PATH_ENV);
        let temp = TempDir::new().expect("failed to create temp dir");
        let locust = temp.path().join("locust");
        write_executable(&locust);

        let home = TempDir::new().expect("failed to create temp dir");

        let result = with_env(&[("PATH", temp.path()), ("HOME", home.path())], || {
            locust_path(None)
        });

        assert_eq!(result.unwrap(), locust);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_should_prefer_default_venv_over_path() {
        env::remove_var(SWEEP_LOCUST_PATH_ENV);
        let home = TempDir::new().expect("failed to create temp dir");
        let bin = home.path().join("locust-env").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        write_executable(&bin.join("locust"));
        let on_path = TempDir::new().expect("failed to create temp dir");
        write_executable(&on_path.path().join("locust"));

        let result = with_env(&[("PATH", on_path.path()), ("HOME", home.path())], || {
            locust_path(None)
        });

        assert_eq!(result.unwrap(), bin.join("locust"));
    }

    /// Run `f` with the given variables set, restoring their previous values afterwards.
    fn with_env<T>(vars: &[(&str, &Path)], f: impl FnOnce() -> T) -> T {
        let originals = vars
            .iter()
            .map(|(name, value)| {
                let original = env::var_os(name);
                env::set_var(name, value);
                (*name, original)
            })
            .collect::<Vec<_>>();

        let result = f();

        for (name, original) in originals {
            match original {
                Some(value) => env::set_var(name, value),
                None => env::remove_var(name),
            }
        }
        result
    }

    #[test]
    fn test_should_expand_home_in_venv_path() {
        let expanded = expand_home(Path::new("~/locust-env"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("locust-env"));
        }
        assert_eq!(
            expand_home(Path::new("/opt/locust-env")),
            Path::new("/opt/locust-env")
        );
    }
}

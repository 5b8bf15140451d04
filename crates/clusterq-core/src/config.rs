//! State-directory resolution.
//!
//! Daemon identity artifacts (pid/uri/log files) live in a shared state
//! directory resolved from `CLUSTERQ_PATH`, falling back to
//! `$HOME/.clusterq`.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "CLUSTERQ_PATH";

const DEFAULT_DIR_NAME: &str = ".clusterq";

/// Resolve the state directory, creating it if it does not exist.
pub fn state_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(STATE_DIR_ENV) {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| Error::Usage("HOME is not set and CLUSTERQ_PATH is unset".into()))?;
            PathBuf::from(home).join(DEFAULT_DIR_NAME)
        }
    };
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_and_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("state");
        // Env vars are process-wide; keep this the only test touching them.
        unsafe { std::env::set_var(STATE_DIR_ENV, &target) };
        let dir = state_dir().unwrap();
        unsafe { std::env::remove_var(STATE_DIR_ENV) };
        assert_eq!(dir, target);
        assert!(dir.is_dir());
    }
}

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default directory for runtime files, relative to the working directory.
pub const STATE_DIR: &str = ".swarm";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Status {
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Initialized => "initialized",
            Status::Running => "running",
            Status::Stopped => "stopped",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: Status,
    pub last_tick: u64,
    pub message: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: Status::Initialized,
            last_tick: 0,
            message: None,
            updated_at: None,
        }
    }
}

pub fn state_file_path(dir: &Path) -> PathBuf {
    dir.join("state.json")
}

pub fn init_state(dir: &Path) -> io::Result<RuntimeState> {
    let mut state = RuntimeState::default();
    save_state(dir, &mut state)?;
    Ok(state)
}

pub fn load_state(dir: &Path) -> io::Result<Option<RuntimeState>> {
    let path = state_file_path(dir);
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let state: RuntimeState = serde_json::from_slice(&bytes).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "failed to parse state file {}; delete it or run `swarm init` to reset: {}",
                path.display(),
                e
            ),
        )
    })?;
    Ok(Some(state))
}

/// Stamp `updated_at` and write the file.
pub fn save_state(dir: &Path, state: &mut RuntimeState) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    state.updated_at = Some(Utc::now());
    let json = serde_json::to_vec_pretty(state)?;
    fs::write(state_file_path(dir), json)?;
    Ok(())
}

pub fn set_status(
    dir: &Path,
    status: Status,
    last_tick: u64,
    message: Option<String>,
) -> io::Result<RuntimeState> {
    let mut state = load_state(dir)?.unwrap_or_default();
    state.status = status;
    state.last_tick = last_tick;
    state.message = message;
    save_state(dir, &mut state)?;
    Ok(state)
}

/// True once someone has marked the runtime stopped.
pub fn stop_requested(dir: &Path) -> io::Result<bool> {
    Ok(load_state(dir)?.is_some_and(|s| s.status == Status::Stopped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("swarm-state-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_is_none() {
        let dir = scratch("missing");
        assert!(load_state(&dir).unwrap().is_none());
        assert!(!stop_requested(&dir).unwrap());
    }

    #[test]
    fn status_round_trips_with_timestamp() {
        let dir = scratch("status");
        init_state(&dir).unwrap();
        let state = set_status(&dir, Status::Running, 12, Some("tick 12".into())).unwrap();
        assert!(state.updated_at.is_some());

        let loaded = load_state(&dir).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Running);
        assert_eq!(loaded.last_tick, 12);
        assert!(!stop_requested(&dir).unwrap());

        set_status(&dir, Status::Stopped, 12, None).unwrap();
        assert!(stop_requested(&dir).unwrap());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = scratch("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(state_file_path(&dir), b"{not json").unwrap();
        let err = load_state(&dir).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let _ = fs::remove_dir_all(&dir);
    }
}

use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::Result;

/// All file locations the application touches, resolved once at startup and
/// passed down explicitly. Nothing else in the crate computes a path.
#[derive(Debug, Clone)]
pub struct AppPaths {
    state_dir: PathBuf,
}

impl AppPaths {
    /// Uses `dir` when the user passed one, otherwise the platform default
    /// state directory. Creates the directory if needed.
    pub fn resolve(dir: Option<PathBuf>) -> Result<Self> {
        let state_dir = match dir {
            Some(v) => v,
            None => default_state_path()?,
        };
        match std::fs::create_dir_all(&state_dir) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self { state_dir })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// The single durable session record. Absence means "no session in progress".
    pub fn session_file(&self) -> PathBuf {
        self.state_dir.join("current_session.json")
    }

    /// Append-only ledger of completed sessions, one JSON object per line.
    pub fn history_file(&self) -> PathBuf {
        self.state_dir.join("history.jsonl")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Generated reports land next to where the user invoked the tool.
    pub fn report_file(&self) -> PathBuf {
        PathBuf::from("report.txt")
    }
}

fn default_state_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path =
                PathBuf::from(env::var("APPDATA").expect("APPDATA should be present on Windows"));
            path.push("codetime");
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .expect("Couldn't find neither XDG_STATE_HOME nor HOME");
            path.push("codetime");
            path
        }
    };

    Ok(path)
}

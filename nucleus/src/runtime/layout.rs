use std::path::{Path, PathBuf};

/// Files and directories under the runtime home.
///
/// ```text
/// <home>/
///   .lock
///   db/nucleus.db
///   logs/nucleus.log.<date>
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.home_dir.join("db")
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join("nucleus.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join("logs")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.home_dir.join(".lock")
    }

    /// Create every directory the runtime writes to.
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.home_dir)?;
        std::fs::create_dir_all(self.db_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

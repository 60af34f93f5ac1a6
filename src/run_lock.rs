use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use crate::utils::error::{AppError, Result};

/// Cross-process guard against overlapping runs. The scheduler is expected
/// to serialize invocations; this catches the case where it does not, since
/// two concurrent runs against one store would corrupt classification.
///
/// Created with create-new semantics, removed on drop. A crashed run leaves
/// the file behind; the operator removes it after confirming no run is live
/// (the file records the holder's pid).
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    AppError::RunLocked(path.display().to_string())
                } else {
                    AppError::Io(e)
                }
            })?;

        let _ = writeln!(file, "{}", std::process::id());
        Ok(Self { path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

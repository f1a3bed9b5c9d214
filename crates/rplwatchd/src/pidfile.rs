use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// A file holding our process id, removed when the guard is dropped.
#[derive(Debug)]
pub struct Pidfile {
    path: PathBuf,
}

impl Pidfile {
    pub fn create(path: &Path) -> io::Result<Self> {
        std::fs::write(path, format!("{}\n", std::process::id()))?;
        debug!(path = %path.display(), "pidfile created");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Pidfile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "pidfile removed"),
            Err(e) => debug!(path = %self.path.display(), error = %e, "failed to remove pidfile"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_pid_while_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rplwatchd.pid");

        let guard = Pidfile::create(&path).unwrap();
        let content = std::fs::read_to_string(guard.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_location_fails() {
        assert!(Pidfile::create(Path::new("/nonexistent/dir/rplwatchd.pid")).is_err());
    }
}

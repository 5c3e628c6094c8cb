//! PID file guard.
//!
//! The file is created exclusively with mode 0600 and removed when the
//! guard is dropped, so every exit path of the watchdog cleans it up.
//! A leftover file whose process is gone is treated as stale and replaced.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Holds the PID file for the lifetime of the daemon.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create `path` and write the current PID into it.
    ///
    /// Fails when another live instance owns the file, or when the path
    /// resolves to something other than a regular file.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            create_private_dir(parent)
                .with_context(|| format!("cannot create PID directory {}", parent.display()))?;
        }

        let mut file = match create_exclusive(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                replace_if_stale(&path)?;
                create_exclusive(&path)
                    .with_context(|| format!("cannot create PID file {}", path.display()))?
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot create PID file {}", path.display()));
            }
        };

        // create_new never follows a symlink at the final component, this
        // only guards against special files planted in its place.
        if !file.metadata()?.is_file() {
            let _ = fs::remove_file(&path);
            bail!("PID file {} is not a regular file", path.display());
        }

        let pid = std::process::id();
        writeln!(file, "{pid}")?;
        tracing::info!(pid, path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    /// Location of the PID file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(path = %self.path.display(), "PID file removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove PID file"
            ),
        }
    }
}

fn create_exclusive(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(0o700).recursive(true).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

/// Remove an existing PID file if its process is no longer running.
fn replace_if_stale(path: &Path) -> Result<()> {
    let content = fs::read_to_string(path).unwrap_or_default();
    let recorded = content.trim();

    match recorded.parse::<u32>() {
        Ok(pid) if process_alive(pid) => bail!(
            "PID file {} belongs to running process {}; is another instance running?",
            path.display(),
            pid
        ),
        Ok(_) | Err(_) => {
            tracing::warn!(
                path = %path.display(),
                recorded,
                "replacing stale PID file"
            );
            fs::remove_file(path)
                .with_context(|| format!("cannot remove stale PID file {}", path.display()))
        }
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

/// Without procfs every recorded PID is assumed to be alive.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

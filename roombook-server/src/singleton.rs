//! Single-instance guard.
//!
//! Two servers sharing one store snapshot would double-book rooms past the
//! per-room locks, so startup takes an exclusive flock on a file under the
//! roombook config directory and holds it until the process exits.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Holds the flock for the life of the server; dropping it releases the
/// lock, so keep it bound in `main`.
pub struct InstanceLock {
    _file: File,
}

impl InstanceLock {
    /// Take the exclusive lock, writing our pid into the file so an
    /// operator can see who holds it.
    pub fn acquire_in(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create {}", dir.display()))?;
        let path = dir.join("server.lock");

        let mut file =
            File::create(&path).with_context(|| format!("could not open {}", path.display()))?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "another roombook-server is already running (lock held at {})",
                path.display()
            )
        })?;

        // Purely informational; the flock is what enforces exclusivity.
        let _ = writeln!(file, "{}", std::process::id());

        Ok(InstanceLock { _file: file })
    }

    pub fn acquire() -> Result<Self> {
        Self::acquire_in(&default_dir()?)
    }
}

fn default_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine a config directory"))?;
    Ok(base.join("roombook"))
}

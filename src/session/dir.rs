// ABOUTME: The directory holding control sockets and askpass helpers.
// ABOUTME: Enforces the unix socket path budget when naming control sockets.

use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::ssh;
use crate::types::SessionId;

#[cfg(target_os = "linux")]
const SUN_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const SUN_PATH_LEN: usize = 104;

/// ssh binds `<ControlPath>.<16 random chars>` before renaming into place.
const SSH_BIND_SUFFIX: usize = 17;

/// Longest control path ssh can bind, excluding the trailing NUL.
pub const CONTROL_PATH_LIMIT: usize = SUN_PATH_LEN - 1 - SSH_BIND_SUFFIX;

#[derive(Debug)]
pub struct SessionDir {
    path: PathBuf,
    // Removes the directory on drop when we created it.
    _temp: Option<TempDir>,
}

impl SessionDir {
    /// Use `configured`, creating it if needed, or a fresh private directory under /tmp.
    /// Only directories created here are made private; an existing one keeps its mode.
    pub fn new(configured: Option<&Path>) -> io::Result<Self> {
        match configured {
            Some(path) => {
                if !path.is_dir() {
                    std::fs::DirBuilder::new()
                        .recursive(true)
                        .mode(0o700)
                        .create(path)?;
                }
                Ok(Self {
                    path: path.to_path_buf(),
                    _temp: None,
                })
            }
            None => {
                // /tmp rather than $TMPDIR: the latter is often too long for sockets.
                let temp = tempfile::Builder::new()
                    .prefix("sshmux-")
                    .tempdir_in("/tmp")?;
                Ok(Self {
                    path: temp.path().to_path_buf(),
                    _temp: Some(temp),
                })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<dir>/s-<id>.sock`, or an error when ssh could not bind it.
    pub fn control_path(&self, id: &SessionId) -> ssh::Result<PathBuf> {
        let path = self.path.join(format!("s-{id}.sock"));
        let len = path.as_os_str().len();
        if len > CONTROL_PATH_LIMIT {
            return Err(ssh::Error::ControlPathTooLong {
                path,
                len,
                limit: CONTROL_PATH_LIMIT,
            });
        }
        Ok(path)
    }
}
